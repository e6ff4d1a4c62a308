//! Batch orchestration for a chapter's image manifest.
//!
//! Assets are grouped into batches, and each batch is drained in fixed
//! concurrency windows. Pacing pauses between windows and batches keep
//! the asset host from rate limiting the session; a batch that saw
//! failures earns the longer pause.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::time::{sleep, Duration};
use tracing::{debug, instrument, warn};

use crate::api::ImageManifestEntry;

use super::constants::{
    BATCH_SIZE, FAILURE_BATCH_PAUSE_MS, INTER_BATCH_PAUSE_MS, MAX_CONCURRENT_ASSETS,
    WINDOW_PAUSE_MS,
};
use super::error::{AssetDownload, AssetFailure};
use super::transport::AssetTransport;

/// Result of draining one chapter's manifest.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Downloaded assets, in manifest order regardless of completion
    /// order.
    pub images: Vec<AssetDownload>,
    /// Assets that exhausted their retries.
    pub failed: Vec<AssetFailure>,
    /// True when the session was cancelled mid-chapter.
    pub cancelled: bool,
}

impl BatchReport {
    /// Storage ids of the downloaded assets, in manifest order.
    #[must_use]
    pub fn image_ids(&self) -> Vec<String> {
        self.images.iter().map(|img| img.image_id.clone()).collect()
    }
}

/// Drains chapter manifests through an [`AssetTransport`].
#[derive(Debug)]
pub struct BatchOrchestrator {
    transport: Arc<AssetTransport>,
}

impl BatchOrchestrator {
    /// Creates an orchestrator over a shared transport.
    #[must_use]
    pub fn new(transport: Arc<AssetTransport>) -> Self {
        Self { transport }
    }

    /// The underlying transport, for session-wide cancellation.
    #[must_use]
    pub fn transport(&self) -> &Arc<AssetTransport> {
        &self.transport
    }

    /// Downloads every asset in `manifest` for `chapter_hid`.
    ///
    /// `progress` is invoked after each individual asset completes, with
    /// the number of assets finished so far, the manifest total, and the
    /// running failure count.
    ///
    /// Requests aborted by a connection reset surface as failures; only
    /// a session-wide cancel marks the report cancelled and stops the
    /// drain early.
    #[instrument(skip(self, manifest, progress), fields(chapter_hid = %chapter_hid, assets = manifest.len()))]
    pub async fn download_chapter<F>(
        &self,
        chapter_hid: &str,
        manifest: &[ImageManifestEntry],
        progress: F,
    ) -> BatchReport
    where
        F: Fn(usize, usize, usize) + Send + Sync,
    {
        let total = manifest.len();
        let mut report = BatchReport::default();
        // Successes keep their manifest index so duplicate asset keys
        // cannot collapse during the final re-sort.
        let mut indexed: Vec<(usize, AssetDownload)> = Vec::new();
        let finished = AtomicUsize::new(0);
        let failed_so_far = AtomicUsize::new(0);

        'batches: for (batch_idx, batch) in manifest.chunks(BATCH_SIZE).enumerate() {
            if batch_idx > 0 {
                let pause = if report.failed.is_empty() {
                    INTER_BATCH_PAUSE_MS
                } else {
                    FAILURE_BATCH_PAUSE_MS
                };
                sleep(Duration::from_millis(pause)).await;
            }

            for (window_idx, window) in batch.chunks(MAX_CONCURRENT_ASSETS).enumerate() {
                if self.transport.is_cancelled() {
                    report.cancelled = true;
                    break 'batches;
                }
                if window_idx > 0 {
                    sleep(Duration::from_millis(WINDOW_PAUSE_MS)).await;
                }

                let window_offset =
                    batch_idx * BATCH_SIZE + window_idx * MAX_CONCURRENT_ASSETS;
                let downloads = window.iter().enumerate().map(|(offset, entry)| {
                    let progress = &progress;
                    let finished = &finished;
                    let failed_so_far = &failed_so_far;
                    async move {
                        let outcome =
                            self.transport.download_asset(chapter_hid, &entry.b2key).await;
                        if let Err(error) = &outcome {
                            if !error.is_cancelled() {
                                failed_so_far.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                        let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
                        progress(done, total, failed_so_far.load(Ordering::Relaxed));
                        (window_offset + offset, outcome)
                    }
                });
                let outcomes = join_all(downloads).await;

                for (entry, (index, outcome)) in window.iter().zip(outcomes) {
                    match outcome {
                        Ok(asset) => indexed.push((index, asset)),
                        Err(error) => {
                            if error.is_cancelled() && self.transport.is_cancelled() {
                                report.cancelled = true;
                            } else {
                                warn!(key = %entry.b2key, %error, "asset failed");
                                report.failed.push(AssetFailure {
                                    image_id: format!("{chapter_hid}-{}", entry.b2key),
                                    error,
                                });
                            }
                        }
                    }
                }

                if report.cancelled {
                    break 'batches;
                }
            }
            debug!(
                batch = batch_idx,
                completed = indexed.len(),
                failed = report.failed.len(),
                "batch drained"
            );
        }

        // Completion order follows retry timing, not page order; the
        // carried manifest index restores page order for storage.
        indexed.sort_by_key(|(index, _)| *index);
        report.images = indexed.into_iter().map(|(_, asset)| asset).collect();

        report
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn manifest(keys: &[&str]) -> Vec<ImageManifestEntry> {
        keys.iter()
            .map(|key| ImageManifestEntry {
                b2key: (*key).to_string(),
                w: 800,
                h: 1200,
                s: 1024,
            })
            .collect()
    }

    fn orchestrator_for(server: &MockServer) -> BatchOrchestrator {
        let transport = Arc::new(AssetTransport::new(
            Url::parse(&format!("{}/", server.uri())).unwrap(),
        ));
        BatchOrchestrator::new(transport)
    }

    #[tokio::test]
    async fn test_download_chapter_returns_manifest_order() {
        let server = MockServer::start().await;
        for key in ["a.jpg", "b.jpg", "c.jpg"] {
            // Later pages respond faster; order must still follow the
            // manifest.
            let delay = match key {
                "a.jpg" => 80,
                "b.jpg" => 40,
                _ => 0,
            };
            Mock::given(method("GET"))
                .and(path(format!("/{key}")))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_bytes(key.as_bytes().to_vec())
                        .set_delay(Duration::from_millis(delay)),
                )
                .mount(&server)
                .await;
        }

        let orchestrator = orchestrator_for(&server);
        let report = orchestrator
            .download_chapter("ch1", &manifest(&["a.jpg", "b.jpg", "c.jpg"]), |_, _, _| {})
            .await;

        assert!(!report.cancelled);
        assert!(report.failed.is_empty());
        assert_eq!(
            report.image_ids(),
            vec!["ch1-a.jpg", "ch1-b.jpg", "ch1-c.jpg"]
        );
    }

    #[tokio::test]
    async fn test_download_chapter_collects_failures_and_survivors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/good.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bad.jpg"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let seen = Mutex::new(Vec::new());
        let orchestrator = orchestrator_for(&server);
        let report = orchestrator
            .download_chapter(
                "ch1",
                &manifest(&["good.jpg", "bad.jpg"]),
                |done, total, failed| {
                    seen.lock().unwrap().push((done, total, failed));
                },
            )
            .await;

        assert_eq!(report.image_ids(), vec!["ch1-good.jpg"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].image_id, "ch1-bad.jpg");
        assert!(!report.cancelled);
        // The failure count rides along in the progress events.
        assert_eq!(seen.into_inner().unwrap().last(), Some(&(2, 2, 1)));
    }

    #[tokio::test]
    async fn test_download_chapter_keeps_duplicate_keys_by_position() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&server)
            .await;

        let orchestrator = orchestrator_for(&server);
        let report = orchestrator
            .download_chapter("ch1", &manifest(&["x.jpg", "x.jpg"]), |_, _, _| {})
            .await;

        // Both manifest positions survive even though the storage id
        // repeats.
        assert_eq!(report.image_ids(), vec!["ch1-x.jpg", "ch1-x.jpg"]);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn test_download_chapter_cancelled_session_is_marked() {
        let server = MockServer::start().await;
        let orchestrator = orchestrator_for(&server);
        orchestrator.transport().cancel();

        let report = orchestrator
            .download_chapter("ch1", &manifest(&["a.jpg"]), |_, _, _| {})
            .await;
        assert!(report.cancelled);
        assert!(report.images.is_empty());
    }

    #[tokio::test]
    async fn test_download_chapter_reports_progress() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&server)
            .await;

        let seen = Mutex::new(Vec::new());
        let orchestrator = orchestrator_for(&server);
        let report = orchestrator
            .download_chapter(
                "ch1",
                &manifest(&["a.jpg", "b.jpg"]),
                |done, total, failed| {
                    seen.lock().unwrap().push((done, total, failed));
                },
            )
            .await;

        assert_eq!(report.images.len(), 2);
        // One event per completed asset.
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen.last(), Some(&(2, 2, 0)));
    }
}

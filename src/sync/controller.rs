//! The sync controller: ties catalog fetches, release selection, asset
//! downloads, and persistence into whole-series operations.
//!
//! Chapters are downloaded strictly one at a time; concurrency lives
//! inside a chapter's image drain. Images are persisted before their
//! chapter row, so an interrupted run can never leave a chapter row
//! pointing at missing payloads.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::api::{CatalogClient, ChapterRecord, SeriesInfo, DEFAULT_PAGE_SIZE};
use crate::download::{AssetTransport, BatchOrchestrator};
use crate::select::{
    default_rankings, merge_rankings, parse_chapter_number, select_releases, translator_name,
    translator_snapshot, SelectedRelease, TranslatorInfo, TranslatorPreferences,
    UNKNOWN_TRANSLATOR,
};
use crate::store::{ImageRecord, LocalChapter, LocalSeries, SeriesStore, StoreError};

use super::gate::{FutureChapter, FutureChapterGate};
use super::outcome::{
    ConflictingChapter, DownloadReport, FailedChapter, InterruptKind, ResumeDescriptor,
    SyncError, UpdateOutcome,
};
use super::progress::{Phase, ProgressEvent, ProgressFn};

/// Default language filter for chapter listings.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Orchestrates series downloads, updates, and resumes over a store.
pub struct SyncController<S> {
    catalog: CatalogClient,
    orchestrator: BatchOrchestrator,
    store: Arc<S>,
    gate: Arc<dyn FutureChapterGate>,
    progress: Option<ProgressFn>,
    lang: String,
}

struct RunContext {
    series_id: String,
    preferences: TranslatorPreferences,
    min_chapter_floor: Option<f64>,
    previously_completed: Vec<f64>,
}

#[derive(Default)]
struct RunSummary {
    completed: Vec<f64>,
    written: usize,
    failed: Vec<FailedChapter>,
    remaining: Vec<ChapterRecord>,
    cancelled: bool,
}

impl<S: SeriesStore> SyncController<S> {
    /// Creates a controller over a catalog client, asset transport, and
    /// store.
    #[must_use]
    pub fn new(
        catalog: CatalogClient,
        transport: Arc<AssetTransport>,
        store: Arc<S>,
        gate: Arc<dyn FutureChapterGate>,
    ) -> Self {
        Self {
            catalog,
            orchestrator: BatchOrchestrator::new(transport),
            store,
            gate,
            progress: None,
            lang: DEFAULT_LANGUAGE.to_string(),
        }
    }

    /// Attaches a progress sink.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Overrides the chapter listing language filter.
    #[must_use]
    pub fn with_language(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    /// Cancels the running operation. In-flight asset requests abort
    /// and the chapter loop stops at the next boundary.
    pub fn cancel(&self) {
        self.orchestrator.transport().cancel();
    }

    /// Fetches series metadata and its translator snapshot without
    /// downloading anything.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Fetch`] when the catalog is unreachable.
    #[instrument(skip(self))]
    pub async fn fetch_translator_info(
        &self,
        slug: &str,
    ) -> Result<(SeriesInfo, Vec<TranslatorInfo>), SyncError> {
        let info = self.catalog.fetch_series(slug).await?;
        let records = self.fetch_language_chapters(&info.comic.hid).await?;
        let translators = translator_snapshot(&records);
        Ok((info, translators))
    }

    /// Downloads a series from scratch.
    ///
    /// Selects one release per chapter under `preferences`, gates
    /// future-dated chapters through the confirmation gate, then walks
    /// the available chapters sequentially. Confirming the gate proceeds
    /// with the already-published subset; the future-dated ones are left
    /// for a later update.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Declined`] when the gate rejects pending
    /// future chapters (nothing is written in that case), and
    /// [`SyncError::Interrupted`] with a resume descriptor when the run
    /// stops early.
    #[instrument(skip(self, preferences), fields(slug = %slug))]
    pub async fn download_series(
        &self,
        slug: &str,
        preferences: TranslatorPreferences,
        min_chapter_floor: Option<f64>,
    ) -> Result<DownloadReport, SyncError> {
        self.emit(Phase::Setup, 0, 2, "fetching series metadata");
        let info = self.catalog.fetch_series(slug).await?;
        let series_id = info.comic.hid.clone();

        self.emit(Phase::Setup, 1, 2, "fetching chapter listing");
        let records = self.fetch_language_chapters(&series_id).await?;
        let translators = translator_snapshot(&records);

        let mut selected = select_releases(&records, &preferences);
        apply_floor(&mut selected, min_chapter_floor);

        let (selected, pending) = split_unpublished(selected);
        if !pending.is_empty() && !self.gate.confirm(&pending).await {
            info!(series_id, pending = pending.len(), "future chapters declined");
            return Err(SyncError::Declined);
        }

        self.upsert_series_row(&info, &translators, &preferences, min_chapter_floor)
            .await?;

        let ctx = RunContext {
            series_id: series_id.clone(),
            preferences,
            min_chapter_floor,
            previously_completed: Vec::new(),
        };
        let summary = self.run_chapters(&ctx, selected).await?;
        classify(&ctx, summary)
    }

    /// Brings a stored series up to date.
    ///
    /// Already-downloaded chapters are never re-fetched. A new chapter
    /// whose winning release comes from a translator outside the stored
    /// preferences is a conflict: conflicts block the whole update
    /// unless `skip_conflict_warning` is set, in which case everything
    /// downloads and the conflicts are still reported.
    ///
    /// `min_chapter_floor` overrides the stored floor for this call when
    /// given.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SeriesNotFound`] for an unknown id and
    /// [`SyncError::Interrupted`] when the chapter run stops early.
    #[instrument(skip(self), fields(series_id = %series_id))]
    pub async fn update_series(
        &self,
        series_id: &str,
        min_chapter_floor: Option<f64>,
        skip_conflict_warning: bool,
    ) -> Result<UpdateOutcome, SyncError> {
        let stored = self
            .store
            .get_series(series_id)
            .await?
            .ok_or_else(|| SyncError::SeriesNotFound {
                id: series_id.to_string(),
            })?;
        let floor = min_chapter_floor.or(stored.min_chapter_floor);

        self.emit(Phase::Setup, 0, 2, "fetching series metadata");
        let info = self.catalog.fetch_series(&stored.slug).await?;

        self.emit(Phase::Setup, 1, 2, "fetching chapter listing");
        let records = self.fetch_language_chapters(series_id).await?;
        let translators = ranked_snapshot(&stored.translators, translator_snapshot(&records));

        let preferences = stored
            .preferences
            .clone()
            .unwrap_or_else(|| default_preferences(&translators));

        let mut selected = select_releases(&records, &preferences);
        apply_floor(&mut selected, floor);
        selected.retain(|sel| {
            !stored
                .downloaded_chapters
                .iter()
                .any(|n| n.to_bits() == sel.number.to_bits())
        });

        let conflicts = translator_conflicts(&selected, &preferences);

        // Refresh the series row even when nothing gets downloaded, so
        // the translator snapshot and metadata stay current.
        self.upsert_series_row(&info, &translators, &preferences, floor)
            .await?;

        if !conflicts.is_empty() && !skip_conflict_warning {
            warn!(
                series_id,
                conflicts = conflicts.len(),
                "unpreferred translators block the update"
            );
            return Ok(UpdateOutcome {
                new_chapters: 0,
                conflicts,
            });
        }

        if selected.is_empty() {
            return Ok(UpdateOutcome {
                new_chapters: 0,
                conflicts,
            });
        }

        let (selected, pending) = split_unpublished(selected);
        if !pending.is_empty() && !self.gate.confirm(&pending).await {
            info!(series_id, pending = pending.len(), "future chapters declined");
            return Ok(UpdateOutcome {
                new_chapters: 0,
                conflicts,
            });
        }

        let ctx = RunContext {
            series_id: series_id.to_string(),
            preferences,
            min_chapter_floor: floor,
            previously_completed: stored.downloaded_chapters,
        };
        let summary = self.run_chapters(&ctx, selected).await?;
        let report = classify(&ctx, summary)?;
        Ok(UpdateOutcome {
            new_chapters: report.chapters_written,
            conflicts,
        })
    }

    /// Resumes an interrupted run from its descriptor.
    ///
    /// The descriptor's remaining releases are downloaded without a
    /// fresh listing fetch; future-dated releases are gated again since
    /// time has passed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SeriesNotFound`] when the series row from
    /// the interrupted run is gone, [`SyncError::Declined`] on a gate
    /// rejection, and [`SyncError::Interrupted`] if the run stops early
    /// again.
    #[instrument(skip(self, descriptor), fields(series_id = %descriptor.series_id))]
    pub async fn resume_download(
        &self,
        descriptor: ResumeDescriptor,
    ) -> Result<DownloadReport, SyncError> {
        if self.store.get_series(&descriptor.series_id).await?.is_none() {
            return Err(SyncError::SeriesNotFound {
                id: descriptor.series_id.clone(),
            });
        }

        // A partially downloaded chapter has a row on disk and so looks
        // downloaded to the store; the descriptor's completed list is
        // the authority on what can be skipped.
        let mut selected: Vec<SelectedRelease> = descriptor
            .remaining_chapters
            .iter()
            .filter_map(|record| {
                parse_chapter_number(&record.chap).map(|number| SelectedRelease {
                    number,
                    translator: translator_name(record).to_string(),
                    record: record.clone(),
                })
            })
            .collect();
        selected.sort_by(|a, b| a.number.total_cmp(&b.number));
        selected.retain(|sel| {
            !descriptor
                .completed_chapters
                .iter()
                .any(|n| n.to_bits() == sel.number.to_bits())
        });

        let (selected, pending) = split_unpublished(selected);
        if !pending.is_empty() && !self.gate.confirm(&pending).await {
            return Err(SyncError::Declined);
        }

        let ctx = RunContext {
            series_id: descriptor.series_id,
            preferences: descriptor.preferences,
            min_chapter_floor: descriptor.min_chapter_floor,
            previously_completed: descriptor.completed_chapters,
        };
        let summary = self.run_chapters(&ctx, selected).await?;
        classify(&ctx, summary)
    }

    async fn fetch_language_chapters(
        &self,
        series_hid: &str,
    ) -> Result<Vec<ChapterRecord>, SyncError> {
        let mut records = self
            .catalog
            .fetch_all_chapters(series_hid, DEFAULT_PAGE_SIZE)
            .await?;
        records.retain(|record| record.lang == self.lang);
        Ok(records)
    }

    async fn upsert_series_row(
        &self,
        info: &SeriesInfo,
        translators: &[TranslatorInfo],
        preferences: &TranslatorPreferences,
        min_chapter_floor: Option<f64>,
    ) -> Result<(), SyncError> {
        let raw_info = serde_json::to_value(info)
            .map_err(|e| StoreError::serialization("encode series info", e))?;
        let series = LocalSeries {
            id: info.comic.hid.clone(),
            title: info.comic.title.clone(),
            slug: info.comic.slug.clone(),
            cover_url: info.comic.cover_url.clone(),
            total_chapters: info.comic.chapter_count,
            downloaded_chapters: Vec::new(),
            last_updated: Utc::now(),
            info: raw_info,
            translators: translators.to_vec(),
            preferences: Some(preferences.clone()),
            last_read_chapter: None,
            min_chapter_floor,
        };
        self.store.upsert_series(&series).await?;
        Ok(())
    }

    /// Walks the selected chapters strictly in order, downloading each
    /// chapter's images and persisting as it goes.
    async fn run_chapters(
        &self,
        ctx: &RunContext,
        selected: Vec<SelectedRelease>,
    ) -> Result<RunSummary, SyncError> {
        let total = selected.len();
        let mut summary = RunSummary::default();
        let mut last_had_failures = false;

        for (idx, sel) in selected.iter().enumerate() {
            if self.orchestrator.transport().is_cancelled() {
                summary.cancelled = true;
                summary
                    .remaining
                    .extend(selected[idx..].iter().map(|s| s.record.clone()));
                break;
            }

            // A struggling previous chapter earns a health probe before
            // committing to the next one; a dead host gets a forced
            // connection reset rather than blind retries.
            if last_had_failures {
                self.emit(Phase::Chapters, idx, total, "checking asset host health");
                if !self.orchestrator.transport().probe_health().await {
                    warn!(series_id = %ctx.series_id, "asset host unhealthy; resetting connection");
                    self.orchestrator.transport().force_reset().await;
                }
            }

            self.emit(
                Phase::Chapters,
                idx + 1,
                total,
                &format!("chapter {}", sel.record.chap),
            );

            let manifest = match self.catalog.fetch_image_manifest(&sel.record.hid).await {
                Ok(manifest) if manifest.is_empty() => {
                    summary.failed.push(FailedChapter {
                        number: sel.number,
                        hid: sel.record.hid.clone(),
                        reason: "empty image manifest".into(),
                    });
                    summary.remaining.push(sel.record.clone());
                    last_had_failures = true;
                    continue;
                }
                Ok(manifest) => manifest,
                Err(error) => {
                    summary.failed.push(FailedChapter {
                        number: sel.number,
                        hid: sel.record.hid.clone(),
                        reason: error.to_string(),
                    });
                    summary.remaining.push(sel.record.clone());
                    last_had_failures = true;
                    continue;
                }
            };

            let chap_label = sel.record.chap.clone();
            let progress = self.progress.clone();
            let report = self
                .orchestrator
                .download_chapter(&sel.record.hid, &manifest, move |done, total, failed| {
                    if let Some(progress) = &progress {
                        progress(ProgressEvent {
                            phase: Phase::Images,
                            current: done,
                            total,
                            message: format!(
                                "Chapter {chap_label} - {done}/{total} pages ({failed} failed)"
                            ),
                        });
                    }
                })
                .await;

            if report.cancelled {
                summary.cancelled = true;
                summary
                    .remaining
                    .extend(selected[idx..].iter().map(|s| s.record.clone()));
                break;
            }

            let now = Utc::now();
            if !report.images.is_empty() {
                let records: Vec<ImageRecord> = report
                    .images
                    .iter()
                    .map(|img| ImageRecord {
                        id: img.image_id.clone(),
                        payload: img.bytes.clone(),
                        downloaded_at: now,
                    })
                    .collect();
                self.store.insert_images(&records).await?;
                self.store
                    .insert_chapter(&LocalChapter {
                        hid: sel.record.hid.clone(),
                        series_id: ctx.series_id.clone(),
                        chapter_number: sel.number,
                        chapter: sel.record.chap.clone(),
                        translator: sel.translator.clone(),
                        image_ids: report.image_ids(),
                        downloaded_at: now,
                        source_updated_at: sel.record.created_at,
                    })
                    .await?;
                summary.written += 1;
            }

            if report.failed.is_empty() {
                summary.completed.push(sel.number);
                last_had_failures = false;
            } else {
                // Survivors are persisted above, but the chapter still
                // counts as failed until every page is on disk.
                summary.failed.push(FailedChapter {
                    number: sel.number,
                    hid: sel.record.hid.clone(),
                    reason: format!(
                        "{} of {} pages failed",
                        report.failed.len(),
                        manifest.len()
                    ),
                });
                summary.remaining.push(sel.record.clone());
                last_had_failures = true;
            }
        }

        Ok(summary)
    }

    fn emit(&self, phase: Phase, current: usize, total: usize, message: &str) {
        if let Some(progress) = &self.progress {
            progress(ProgressEvent {
                phase,
                current,
                total,
                message: message.to_string(),
            });
        }
    }
}

/// Turns a finished run into a report or a resumable interruption.
fn classify(ctx: &RunContext, summary: RunSummary) -> Result<DownloadReport, SyncError> {
    let mut downloaded: Vec<f64> = ctx
        .previously_completed
        .iter()
        .chain(summary.completed.iter())
        .copied()
        .collect();
    downloaded.sort_by(f64::total_cmp);
    downloaded.dedup_by(|a, b| a.to_bits() == b.to_bits());

    let kind = if summary.cancelled {
        Some(InterruptKind::Cancelled)
    } else if !summary.failed.is_empty() && summary.completed.is_empty() {
        Some(InterruptKind::Network)
    } else if !summary.failed.is_empty() {
        Some(InterruptKind::Partial)
    } else {
        None
    };

    match kind {
        None => {
            info!(
                series_id = %ctx.series_id,
                written = summary.written,
                "download run completed"
            );
            Ok(DownloadReport {
                chapters_written: summary.written,
                downloaded_chapters: downloaded,
            })
        }
        Some(kind) => {
            let resume = ResumeDescriptor {
                series_id: ctx.series_id.clone(),
                preferences: ctx.preferences.clone(),
                min_chapter_floor: ctx.min_chapter_floor,
                completed_chapters: downloaded,
                remaining_chapters: summary.remaining,
                failed_chapters: summary.failed.iter().map(|f| f.number).collect(),
            };
            warn!(
                series_id = %ctx.series_id,
                ?kind,
                completed = summary.completed.len(),
                remaining = resume.remaining_chapters.len(),
                "download run interrupted"
            );
            Err(SyncError::Interrupted {
                kind,
                completed: summary.completed.len(),
                remaining: resume.remaining_chapters.len(),
                resume: Box::new(resume),
            })
        }
    }
}

fn apply_floor(selected: &mut Vec<SelectedRelease>, floor: Option<f64>) {
    if let Some(floor) = floor {
        selected.retain(|sel| sel.number >= floor);
    }
}

/// Splits a selection into the already-published releases and the
/// not-yet-published ones to put before the gate. Confirmed runs proceed
/// with the published subset only.
fn split_unpublished(
    selected: Vec<SelectedRelease>,
) -> (Vec<SelectedRelease>, Vec<FutureChapter>) {
    let now = Utc::now();
    let mut available = Vec::with_capacity(selected.len());
    let mut pending = Vec::new();
    for sel in selected {
        match sel.record.publish_at {
            Some(at) if at > now => pending.push(FutureChapter {
                number: sel.number,
                available_at: at,
            }),
            _ => available.push(sel),
        }
    }
    (available, pending)
}

fn default_preferences(translators: &[TranslatorInfo]) -> TranslatorPreferences {
    let mut ranked = default_rankings(translators).into_iter();
    let primary = ranked.next().unwrap_or_else(|| UNKNOWN_TRANSLATOR.to_string());
    TranslatorPreferences {
        primary,
        backups: ranked.collect(),
        allow_backup_override: false,
    }
}

/// Reorders a fresh translator snapshot by the merged ranking: stored
/// order survives for translators still present, newcomers are appended
/// by chapter volume.
fn ranked_snapshot(
    previous: &[TranslatorInfo],
    fresh: Vec<TranslatorInfo>,
) -> Vec<TranslatorInfo> {
    let existing: Vec<String> = previous.iter().map(|info| info.name.clone()).collect();
    merge_rankings(&existing, &fresh)
        .into_iter()
        .filter_map(|name| fresh.iter().find(|info| info.name == name).cloned())
        .collect()
}

fn translator_conflicts(
    selected: &[SelectedRelease],
    preferences: &TranslatorPreferences,
) -> Vec<ConflictingChapter> {
    selected
        .iter()
        .filter(|sel| !preferences.accepts(&sel.translator))
        .map(|sel| ConflictingChapter {
            number: sel.number,
            translator: sel.translator.clone(),
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn release(hid: &str, chap: &str, group: &str) -> SelectedRelease {
        let record: ChapterRecord = serde_json::from_value(serde_json::json!({
            "hid": hid,
            "chap": chap,
            "lang": "en",
            "group_name": [group]
        }))
        .unwrap();
        SelectedRelease {
            number: parse_chapter_number(chap).unwrap(),
            translator: group.to_string(),
            record,
        }
    }

    #[test]
    fn test_apply_floor_drops_chapters_below() {
        let mut selected = vec![
            release("c1", "1", "G"),
            release("c10", "10", "G"),
            release("c10_5", "10.5", "G"),
        ];
        apply_floor(&mut selected, Some(10.0));
        let numbers: Vec<f64> = selected.iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec![10.0, 10.5]);
    }

    #[test]
    fn test_split_unpublished_separates_future_releases() {
        let mut past = release("c1", "1", "G");
        past.record.publish_at = Some(Utc::now() - chrono::Duration::hours(1));
        let mut future = release("c2", "2", "G");
        future.record.publish_at = Some(Utc::now() + chrono::Duration::days(2));
        let undated = release("c3", "3", "G");

        let (available, pending) = split_unpublished(vec![past, future, undated]);
        let numbers: Vec<f64> = available.iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec![1.0, 3.0]);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].number, 2.0);
    }

    #[test]
    fn test_translator_conflicts_flag_unpreferred_selections() {
        let prefs = TranslatorPreferences {
            primary: "G".into(),
            backups: vec!["H".into()],
            allow_backup_override: false,
        };
        let selected = vec![
            release("c1", "1", "G"),
            release("c2", "2", "Stray"),
            release("c3", "3", "H"),
        ];

        let conflicts = translator_conflicts(&selected, &prefs);
        assert_eq!(
            conflicts,
            vec![ConflictingChapter {
                number: 2.0,
                translator: "Stray".into(),
            }]
        );
    }

    #[test]
    fn test_default_preferences_rank_by_chapter_volume() {
        // B has the latest chapter but A has released more of them; the
        // ranking goes by volume.
        let translators = vec![
            TranslatorInfo {
                name: "B".into(),
                chapters: vec![5.0],
                latest_chapter: 5.0,
            },
            TranslatorInfo {
                name: "A".into(),
                chapters: vec![1.0, 2.0],
                latest_chapter: 2.0,
            },
        ];
        let prefs = default_preferences(&translators);
        assert_eq!(prefs.primary, "A");
        assert_eq!(prefs.backups, vec!["B"]);

        let empty = default_preferences(&[]);
        assert_eq!(empty.primary, UNKNOWN_TRANSLATOR);
    }

    #[test]
    fn test_ranked_snapshot_keeps_stored_order_and_appends_newcomers() {
        let info = |name: &str, chapters: &[f64]| TranslatorInfo {
            name: name.into(),
            chapters: chapters.to_vec(),
            latest_chapter: chapters.last().copied().unwrap_or(0.0),
        };
        let previous = vec![info("B", &[1.0]), info("A", &[1.0, 2.0])];
        let fresh = vec![info("A", &[1.0, 2.0, 3.0]), info("B", &[1.0]), info("New", &[4.0])];

        let ranked = ranked_snapshot(&previous, fresh);
        let names: Vec<&str> = ranked.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "New"]);
    }

    fn summary(completed: &[f64], failed: &[f64]) -> RunSummary {
        RunSummary {
            completed: completed.to_vec(),
            written: completed.len(),
            failed: failed
                .iter()
                .map(|n| FailedChapter {
                    number: *n,
                    hid: format!("c{n}"),
                    reason: "pages failed".into(),
                })
                .collect(),
            remaining: Vec::new(),
            cancelled: false,
        }
    }

    fn ctx() -> RunContext {
        RunContext {
            series_id: "s1".into(),
            preferences: TranslatorPreferences::primary_only("G"),
            min_chapter_floor: None,
            previously_completed: Vec::new(),
        }
    }

    #[test]
    fn test_classify_is_partial_whenever_any_chapter_completed() {
        let error = classify(&ctx(), summary(&[1.0], &[2.0])).unwrap_err();
        let SyncError::Interrupted { kind, .. } = error else {
            panic!("expected interruption, got {error:?}");
        };
        assert_eq!(kind, InterruptKind::Partial);
    }

    #[test]
    fn test_classify_is_network_only_when_nothing_completed() {
        let error = classify(&ctx(), summary(&[], &[1.0, 2.0])).unwrap_err();
        let SyncError::Interrupted { kind, .. } = error else {
            panic!("expected interruption, got {error:?}");
        };
        assert_eq!(kind, InterruptKind::Network);
    }
}

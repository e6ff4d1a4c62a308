//! Asset transport: retrying HTTP fetches against the binary asset host.
//!
//! The transport owns the failure accounting for a download session.
//! Every asset failure bumps two counters, and crossing either threshold
//! triggers a connection reset: all in-flight requests are aborted, the
//! HTTP client is rebuilt, and both counters start over after a short
//! pause. Cache defeat is unconditional so a stale intermediary can
//! never satisfy an asset request.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use reqwest::header::{CACHE_CONTROL, PRAGMA};
use reqwest::Client;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;

use super::constants::{
    ASSET_ATTEMPT_TIMEOUT_SECS, CONNECTION_RESET_PAUSE_MS, CONSECUTIVE_FAILURE_THRESHOLD,
    MAX_ASSET_ATTEMPTS, RESET_TRIGGER_THRESHOLD, RETRY_BASE_DELAY_MS,
};
use super::error::{AssetDownload, TransportError};

/// Connect timeout for asset requests, in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Default)]
struct FailureCounters {
    consecutive: u32,
    since_reset: u32,
}

/// Retrying downloader for binary assets.
///
/// Shared across a download session behind an `Arc`; all methods take
/// `&self`.
#[derive(Debug)]
pub struct AssetTransport {
    client: Mutex<Client>,
    base: Url,
    root: CancellationToken,
    inflight: Mutex<HashMap<u64, CancellationToken>>,
    next_request_id: AtomicU64,
    counters: Mutex<FailureCounters>,
    reset_gate: tokio::sync::Mutex<()>,
}

impl AssetTransport {
    /// Creates a transport rooted at the asset host `base`.
    #[must_use]
    pub fn new(base: Url) -> Self {
        Self {
            client: Mutex::new(build_client()),
            base,
            root: CancellationToken::new(),
            inflight: Mutex::new(HashMap::new()),
            next_request_id: AtomicU64::new(0),
            counters: Mutex::new(FailureCounters::default()),
            reset_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Cancels the whole session: every in-flight and future request
    /// resolves to [`TransportError::Cancelled`].
    pub fn cancel(&self) {
        self.root.cancel();
    }

    /// Returns true once the session has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Downloads one asset, retrying transient failures.
    ///
    /// Each attempt gets its own timeout; failed attempts back off
    /// exponentially. Failures feed the session counters and may trigger
    /// a connection reset before the next attempt.
    ///
    /// # Errors
    ///
    /// Returns the final attempt's [`TransportError`] once retries are
    /// exhausted, or [`TransportError::Cancelled`] if the session was
    /// cancelled or a reset aborted this request.
    #[instrument(skip(self), fields(chapter_hid = %chapter_hid, key = %key))]
    pub async fn download_asset(
        &self,
        chapter_hid: &str,
        key: &str,
    ) -> Result<AssetDownload, TransportError> {
        let image_id = format!("{chapter_hid}-{key}");
        let mut last_error = TransportError::Cancelled { key: key.into() };

        for attempt in 0..MAX_ASSET_ATTEMPTS {
            if self.root.is_cancelled() {
                return Err(TransportError::Cancelled { key: key.into() });
            }

            if attempt > 0 {
                let delay = RETRY_BASE_DELAY_MS * 2u64.pow(attempt - 1);
                debug!(attempt, delay_ms = delay, "retrying asset");
                sleep(Duration::from_millis(delay)).await;
            }

            match self.attempt(key, attempt).await {
                Ok(bytes) => {
                    self.record_success();
                    return Ok(AssetDownload { image_id, bytes });
                }
                Err(error) => {
                    if error.is_cancelled() {
                        return Err(error);
                    }
                    debug!(attempt, %error, "asset attempt failed");
                    self.record_failure().await;
                    last_error = error;
                }
            }
        }

        Err(last_error)
    }

    /// Probes the asset host with a lightweight HEAD request.
    ///
    /// Any HTTP response at all means the host is reachable; a 404 for
    /// the probe path is still healthy. Only a network fault or timeout
    /// reports unhealthy.
    #[instrument(skip(self))]
    pub async fn probe_health(&self) -> bool {
        let client = match self.client.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => return false,
        };
        let request = client.head(self.base.clone()).send();
        match timeout(Duration::from_secs(ASSET_ATTEMPT_TIMEOUT_SECS), request).await {
            Ok(Ok(_)) => true,
            Ok(Err(error)) => {
                warn!(%error, "asset host probe failed");
                false
            }
            Err(_) => {
                warn!("asset host probe timed out");
                false
            }
        }
    }

    async fn attempt(&self, key: &str, attempt: u32) -> Result<Vec<u8>, TransportError> {
        let mut url = self
            .base
            .join(key)
            .map_err(|_| TransportError::InvalidUrl { key: key.into() })?;
        url.query_pairs_mut().append_pair("sw-bypass", "true");

        let token = self.root.child_token();
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut inflight) = self.inflight.lock() {
            inflight.insert(request_id, token.clone());
        }

        let result = self.attempt_inner(url, key, attempt, &token).await;

        if let Ok(mut inflight) = self.inflight.lock() {
            inflight.remove(&request_id);
        }
        result
    }

    async fn attempt_inner(
        &self,
        url: Url,
        key: &str,
        attempt: u32,
        token: &CancellationToken,
    ) -> Result<Vec<u8>, TransportError> {
        let client = self
            .client
            .lock()
            .map_err(|_| TransportError::Cancelled { key: key.into() })?
            .clone();

        let request = async {
            let response = client
                .get(url)
                .header(CACHE_CONTROL, "no-store")
                .header(PRAGMA, "no-cache")
                .send()
                .await
                .map_err(|source| TransportError::Network {
                    key: key.into(),
                    source,
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(TransportError::HttpStatus {
                    key: key.into(),
                    status: status.as_u16(),
                });
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|source| TransportError::Network {
                    key: key.into(),
                    source,
                })?;
            if bytes.is_empty() {
                return Err(TransportError::EmptyBody { key: key.into() });
            }
            Ok(bytes.to_vec())
        };

        tokio::select! {
            () = token.cancelled() => Err(TransportError::Cancelled { key: key.into() }),
            outcome = timeout(Duration::from_secs(ASSET_ATTEMPT_TIMEOUT_SECS), request) => {
                match outcome {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::Timeout {
                        key: key.into(),
                        attempts: attempt + 1,
                    }),
                }
            }
        }
    }

    fn record_success(&self) {
        if let Ok(mut counters) = self.counters.lock() {
            counters.consecutive = 0;
        }
    }

    async fn record_failure(&self) {
        let should_reset = match self.counters.lock() {
            Ok(mut counters) => {
                counters.consecutive += 1;
                counters.since_reset += 1;
                counters.consecutive >= CONSECUTIVE_FAILURE_THRESHOLD
                    || counters.since_reset >= RESET_TRIGGER_THRESHOLD
            }
            Err(_) => false,
        };

        if should_reset {
            self.reset_connection(false).await;
        }
    }

    /// Resets the connection regardless of counter state.
    ///
    /// Used when an external health signal says the host has gone bad
    /// before the counters would have tripped on their own.
    pub async fn force_reset(&self) {
        self.reset_connection(true).await;
    }

    /// Aborts in-flight requests, rebuilds the HTTP client, and zeroes
    /// the failure counters after a short pause.
    async fn reset_connection(&self, forced: bool) {
        let _gate = self.reset_gate.lock().await;

        // Another task may have completed the reset while this one
        // waited on the gate.
        let still_needed = forced
            || match self.counters.lock() {
                Ok(counters) => {
                    counters.consecutive >= CONSECUTIVE_FAILURE_THRESHOLD
                        || counters.since_reset >= RESET_TRIGGER_THRESHOLD
                }
                Err(_) => false,
            };
        if !still_needed {
            return;
        }

        let aborted = match self.inflight.lock() {
            Ok(mut inflight) => {
                let count = inflight.len();
                for token in inflight.values() {
                    token.cancel();
                }
                inflight.clear();
                count
            }
            Err(_) => 0,
        };
        warn!(aborted, "resetting asset host connection after repeated failures");

        sleep(Duration::from_millis(CONNECTION_RESET_PAUSE_MS)).await;

        if let Ok(mut client) = self.client.lock() {
            *client = build_client();
        }
        if let Ok(mut counters) = self.counters.lock() {
            counters.consecutive = 0;
            counters.since_reset = 0;
        }
    }
}

#[allow(clippy::expect_used)]
fn build_client() -> Client {
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(ASSET_ATTEMPT_TIMEOUT_SECS))
        .user_agent(concat!("mangavault/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("failed to build HTTP client with static configuration")
}

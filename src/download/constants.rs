//! Tuning constants for asset transport and batch pacing.

/// Per-attempt timeout for a single asset request, in seconds.
pub const ASSET_ATTEMPT_TIMEOUT_SECS: u64 = 12;

/// Maximum attempts per asset before it is reported failed.
pub const MAX_ASSET_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff between attempts, in milliseconds.
///
/// Attempt `n` (zero-based) waits `base * 2^n` before retrying.
pub const RETRY_BASE_DELAY_MS: u64 = 1_000;

/// Consecutive asset failures that trigger a connection reset.
pub const CONSECUTIVE_FAILURE_THRESHOLD: u32 = 5;

/// Cumulative failures since the last reset that trigger another one.
pub const RESET_TRIGGER_THRESHOLD: u32 = 10;

/// Pause after aborting in-flight requests during a connection reset,
/// in milliseconds.
pub const CONNECTION_RESET_PAUSE_MS: u64 = 1_000;

/// Number of assets grouped into one batch.
pub const BATCH_SIZE: usize = 50;

/// Concurrent asset requests within a batch window.
pub const MAX_CONCURRENT_ASSETS: usize = 8;

/// Pause between concurrency windows inside a batch, in milliseconds.
pub const WINDOW_PAUSE_MS: u64 = 50;

/// Pause between batches when the previous batch fully succeeded,
/// in milliseconds.
pub const INTER_BATCH_PAUSE_MS: u64 = 100;

/// Longer pause between batches when the previous batch saw failures,
/// in milliseconds.
pub const FAILURE_BATCH_PAUSE_MS: u64 = 500;

//! Progress reporting callbacks for long-running sync operations.

use std::sync::Arc;

/// Which stage of a sync operation an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Fetching series metadata and the chapter listing.
    Setup,
    /// Walking the selected chapters, one at a time.
    Chapters,
    /// Draining one chapter's image manifest.
    Images,
}

/// One progress update.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// Stage the operation is in.
    pub phase: Phase,
    /// Units completed within the phase.
    pub current: usize,
    /// Total units in the phase.
    pub total: usize,
    /// Human-readable status line.
    pub message: String,
}

/// Callback invoked with progress updates.
///
/// Shared so the chapter loop and the per-image drain can both report
/// through the same sink.
pub type ProgressFn = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

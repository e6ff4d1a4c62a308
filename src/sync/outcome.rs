//! Outcome, resume, and error types for sync operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::{ChapterRecord, FetchError};
use crate::select::TranslatorPreferences;
use crate::store::StoreError;

/// Why a chapter run stopped before finishing cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptKind {
    /// The asset host stopped responding and nothing more could be
    /// downloaded.
    Network,
    /// Some chapters landed, some did not.
    Partial,
    /// The session was cancelled by the caller.
    Cancelled,
}

/// A chapter that failed during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedChapter {
    /// Parsed chapter number.
    pub number: f64,
    /// Release id that was being downloaded.
    pub hid: String,
    /// Short human-readable reason.
    pub reason: String,
}

/// A new chapter whose winning release comes from a translator that is
/// neither the primary nor one of the backups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictingChapter {
    /// Parsed chapter number.
    pub number: f64,
    /// The unpreferred translator selection fell back to.
    pub translator: String,
}

/// Result of an update run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOutcome {
    /// Chapters newly downloaded.
    pub new_chapters: usize,
    /// New chapters only available from unpreferred translators. These
    /// block the update unless the caller skips the warning, in which
    /// case they download and are still reported here.
    pub conflicts: Vec<ConflictingChapter>,
}

/// Result of a completed download run.
#[derive(Debug, Clone)]
pub struct DownloadReport {
    /// Chapters written during this run.
    pub chapters_written: usize,
    /// Chapter numbers now on disk for the series, ascending.
    pub downloaded_chapters: Vec<f64>,
}

/// Everything needed to pick an interrupted run back up later.
///
/// Serialized to disk by callers; the records of the not-yet-downloaded
/// chapters ride along so resuming needs no fresh listing fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeDescriptor {
    /// The series being downloaded.
    pub series_id: String,
    /// Preferences the interrupted run selected with.
    pub preferences: TranslatorPreferences,
    /// Floor the interrupted run filtered with, if any.
    pub min_chapter_floor: Option<f64>,
    /// Chapter numbers that finished before the interruption.
    pub completed_chapters: Vec<f64>,
    /// Winning releases still to download, ascending.
    pub remaining_chapters: Vec<ChapterRecord>,
    /// Chapter numbers that failed before the interruption.
    pub failed_chapters: Vec<f64>,
}

/// Errors from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A catalog fetch failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A persistence operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The requested series is not in the local library.
    #[error("series {id} is not in the local library")]
    SeriesNotFound {
        /// The missing series id.
        id: String,
    },

    /// The caller declined to proceed past a confirmation gate.
    #[error("download declined")]
    Declined,

    /// The run stopped early; the descriptor allows resuming it.
    #[error("download interrupted ({kind:?}): {completed} chapters completed, {remaining} remaining")]
    Interrupted {
        /// Why the run stopped.
        kind: InterruptKind,
        /// Chapters completed before the stop.
        completed: usize,
        /// Chapters left to download.
        remaining: usize,
        /// State to resume from.
        resume: Box<ResumeDescriptor>,
    },
}

impl SyncError {
    /// The resume descriptor, when this error is resumable.
    #[must_use]
    pub fn resume_descriptor(&self) -> Option<&ResumeDescriptor> {
        match self {
            Self::Interrupted { resume, .. } => Some(resume),
            _ => None,
        }
    }
}

//! Whole-series synchronization.
//!
//! [`SyncController`] drives fresh downloads, updates, and resumes.
//! Interruptions come back as [`SyncError::Interrupted`] carrying a
//! [`ResumeDescriptor`] the caller can persist and feed back in later.

mod controller;
mod gate;
mod outcome;
mod progress;

pub use controller::{SyncController, DEFAULT_LANGUAGE};
pub use gate::{format_time_until, FutureChapter, FutureChapterGate, StaticGate};
pub use outcome::{
    ConflictingChapter, DownloadReport, FailedChapter, InterruptKind, ResumeDescriptor,
    SyncError, UpdateOutcome,
};
pub use progress::{Phase, ProgressEvent, ProgressFn};

//! Mangavault Core Library
//!
//! This library keeps versioned offline copies of manga series: it
//! fetches chapter listings from a remote catalog, resolves which
//! release to keep when several translators cover the same chapter,
//! downloads page images in paced batches, and stores everything in a
//! local SQLite library that can be re-synced and resumed.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`api`] - Remote catalog access (series, listings, image manifests)
//! - [`db`] - Database connection and schema management
//! - [`download`] - Asset transport and batch orchestration
//! - [`select`] - Release selection and translator attribution
//! - [`store`] - Local persistence of series, chapters, and images
//! - [`sync`] - Whole-series download, update, and resume flows

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod db;
pub mod download;
pub mod select;
pub mod store;
pub mod sync;

// Re-export commonly used types
pub use api::{CatalogClient, FetchError};
pub use db::Database;
pub use download::{AssetTransport, BatchOrchestrator, TransportError};
pub use select::{TranslatorInfo, TranslatorPreferences};
pub use store::{LocalChapter, LocalSeries, SeriesStore, SqliteStore, StoreError};
pub use sync::{
    DownloadReport, FutureChapterGate, InterruptKind, ResumeDescriptor, StaticGate,
    SyncController, SyncError, UpdateOutcome,
};

//! Remote catalog API access.
//!
//! This module provides the [`CatalogClient`] for the three read
//! endpoints the engine consumes — series metadata, the paginated
//! chapter listing, and per-chapter image manifests — plus the serde
//! types those endpoints return. Binary asset downloads live in
//! [`crate::download`], which talks to the asset host directly.

mod client;
mod error;
mod types;

pub use client::{CatalogClient, DEFAULT_PAGE_SIZE, MAX_CATALOG_PAGES};
pub use error::FetchError;
pub use types::{
    ChapterListing, ChapterRecord, Credit, GroupLink, GroupRef, Identity, IdentityTraits,
    ImageManifestEntry, SeriesDescriptor, SeriesInfo,
};

//! Storage seam for the sync engine.

use async_trait::async_trait;

use super::models::{ImageRecord, LocalChapter, LocalSeries};
use super::StoreError;

/// Persistence operations the sync engine depends on.
///
/// Write ordering matters: callers persist a chapter's images before its
/// chapter row, so a chapter row always implies its payloads exist.
#[async_trait]
pub trait SeriesStore: Send + Sync {
    /// Inserts or replaces a series row.
    async fn upsert_series(&self, series: &LocalSeries) -> Result<(), StoreError>;

    /// Loads one series, reconciling its derived fields against the
    /// chapter rows first.
    async fn get_series(&self, id: &str) -> Result<Option<LocalSeries>, StoreError>;

    /// Lists all series, each reconciled.
    async fn list_series(&self) -> Result<Vec<LocalSeries>, StoreError>;

    /// Deletes a series and everything under it: chapter rows and their
    /// image payloads.
    async fn delete_series(&self, id: &str) -> Result<(), StoreError>;

    /// Stores image payloads. Idempotent per id.
    async fn insert_images(&self, images: &[ImageRecord]) -> Result<(), StoreError>;

    /// Inserts or replaces a chapter row. Call only after the chapter's
    /// images are stored.
    async fn insert_chapter(&self, chapter: &LocalChapter) -> Result<(), StoreError>;

    /// Lists a series' chapter rows, ascending by chapter number.
    async fn get_chapters(&self, series_id: &str) -> Result<Vec<LocalChapter>, StoreError>;

    /// Deletes one chapter row and its image payloads.
    async fn delete_chapter(&self, series_id: &str, chapter_hid: &str)
        -> Result<(), StoreError>;

    /// Loads one stored image payload.
    async fn get_image(&self, id: &str) -> Result<Option<ImageRecord>, StoreError>;
}

//! SQLite-backed [`SeriesStore`].
//!
//! JSON-shaped columns are stored as text and decoded on read;
//! timestamps are RFC 3339 text. Derived series fields are reconciled
//! against the chapter rows on every read and written back when they
//! drift.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::{debug, instrument};

use crate::db::Database;

use super::models::{ImageRecord, LocalChapter, LocalSeries};
use super::repository::SeriesStore;
use super::StoreError;

/// Production store over the shared database pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Database,
}

#[derive(Debug, FromRow)]
struct SeriesRow {
    id: String,
    title: String,
    slug: String,
    cover_url: String,
    total_chapters: i64,
    downloaded_chapters: String,
    last_updated: String,
    info: String,
    translators: String,
    preferences: Option<String>,
    last_read_chapter: Option<String>,
    min_chapter_floor: Option<f64>,
}

#[derive(Debug, FromRow)]
struct ChapterRow {
    chapter_hid: String,
    series_id: String,
    chapter_number: f64,
    chapter: String,
    translator: String,
    image_ids: String,
    downloaded_at: String,
    source_updated_at: Option<String>,
}

impl SqliteStore {
    /// Creates a store over an open database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Recomputes a series' derived fields from its chapter rows and
    /// writes them back when they drifted.
    ///
    /// Derived fields: `downloaded_chapters` is the ascending set of
    /// persisted chapter numbers, and `total_chapters` never drops below
    /// the number of chapters actually on disk.
    async fn reconcile(&self, series: &mut LocalSeries) -> Result<(), StoreError> {
        let chapters = self.get_chapters(&series.id).await?;
        let mut downloaded: Vec<f64> = chapters.iter().map(|c| c.chapter_number).collect();
        downloaded.sort_by(f64::total_cmp);
        downloaded.dedup_by(|a, b| a.to_bits() == b.to_bits());

        #[allow(clippy::cast_possible_truncation)]
        let floor_total = downloaded.len() as u32;
        let total = series.total_chapters.max(floor_total);

        if downloaded == series.downloaded_chapters && total == series.total_chapters {
            return Ok(());
        }

        debug!(
            series_id = %series.id,
            stored = series.downloaded_chapters.len(),
            actual = downloaded.len(),
            "reconciling drifted series row"
        );
        series.downloaded_chapters = downloaded;
        series.total_chapters = total;

        let downloaded_json = encode_json(&series.downloaded_chapters, "downloaded chapters")?;
        sqlx::query(
            r"UPDATE series SET downloaded_chapters = ?, total_chapters = ? WHERE id = ?",
        )
        .bind(&downloaded_json)
        .bind(i64::from(series.total_chapters))
        .bind(&series.id)
        .execute(self.db.pool())
        .await
        .map_err(|e| StoreError::query("reconciling series", e))?;

        Ok(())
    }

    fn series_from_row(row: SeriesRow) -> Result<LocalSeries, StoreError> {
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let total_chapters = row.total_chapters.max(0) as u32;
        Ok(LocalSeries {
            id: row.id,
            title: row.title,
            slug: row.slug,
            cover_url: row.cover_url,
            total_chapters,
            downloaded_chapters: decode_json(&row.downloaded_chapters, "downloaded chapters")?,
            last_updated: parse_timestamp("last_updated", &row.last_updated)?,
            info: decode_json(&row.info, "series info")?,
            translators: decode_json(&row.translators, "translator snapshot")?,
            preferences: row
                .preferences
                .as_deref()
                .map(|raw| decode_json(raw, "preferences"))
                .transpose()?,
            last_read_chapter: row
                .last_read_chapter
                .as_deref()
                .map(|raw| decode_json(raw, "last read chapter"))
                .transpose()?,
            min_chapter_floor: row.min_chapter_floor,
        })
    }

    fn chapter_from_row(row: ChapterRow) -> Result<LocalChapter, StoreError> {
        Ok(LocalChapter {
            hid: row.chapter_hid,
            series_id: row.series_id,
            chapter_number: row.chapter_number,
            chapter: row.chapter,
            translator: row.translator,
            image_ids: decode_json(&row.image_ids, "image ids")?,
            downloaded_at: parse_timestamp("downloaded_at", &row.downloaded_at)?,
            source_updated_at: row
                .source_updated_at
                .as_deref()
                .map(|raw| parse_timestamp("source_updated_at", raw))
                .transpose()?,
        })
    }
}

#[async_trait]
impl SeriesStore for SqliteStore {
    #[instrument(skip(self, series), fields(series_id = %series.id))]
    async fn upsert_series(&self, series: &LocalSeries) -> Result<(), StoreError> {
        let downloaded = encode_json(&series.downloaded_chapters, "downloaded chapters")?;
        let info = encode_json(&series.info, "series info")?;
        let translators = encode_json(&series.translators, "translator snapshot")?;
        let preferences = series
            .preferences
            .as_ref()
            .map(|p| encode_json(p, "preferences"))
            .transpose()?;
        let last_read = series
            .last_read_chapter
            .as_ref()
            .map(|c| encode_json(c, "last read chapter"))
            .transpose()?;

        sqlx::query(
            r"
            INSERT INTO series (
                id, title, slug, cover_url, total_chapters, downloaded_chapters,
                last_updated, info, translators, preferences, last_read_chapter,
                min_chapter_floor
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                slug = excluded.slug,
                cover_url = excluded.cover_url,
                total_chapters = MAX(series.total_chapters, excluded.total_chapters),
                downloaded_chapters = excluded.downloaded_chapters,
                last_updated = excluded.last_updated,
                info = excluded.info,
                translators = excluded.translators,
                preferences = excluded.preferences,
                last_read_chapter = excluded.last_read_chapter,
                min_chapter_floor = excluded.min_chapter_floor
            ",
        )
        .bind(&series.id)
        .bind(&series.title)
        .bind(&series.slug)
        .bind(&series.cover_url)
        .bind(i64::from(series.total_chapters))
        .bind(&downloaded)
        .bind(series.last_updated.to_rfc3339())
        .bind(&info)
        .bind(&translators)
        .bind(preferences)
        .bind(last_read)
        .bind(series.min_chapter_floor)
        .execute(self.db.pool())
        .await
        .map_err(|e| StoreError::query("upserting series", e))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_series(&self, id: &str) -> Result<Option<LocalSeries>, StoreError> {
        let row = sqlx::query_as::<_, SeriesRow>(r"SELECT * FROM series WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| StoreError::query("loading series", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut series = Self::series_from_row(row)?;
        self.reconcile(&mut series).await?;
        Ok(Some(series))
    }

    #[instrument(skip(self))]
    async fn list_series(&self) -> Result<Vec<LocalSeries>, StoreError> {
        let rows = sqlx::query_as::<_, SeriesRow>(r"SELECT * FROM series ORDER BY title")
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| StoreError::query("listing series", e))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut series = Self::series_from_row(row)?;
            self.reconcile(&mut series).await?;
            out.push(series);
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    async fn delete_series(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query(
            r"
            DELETE FROM images WHERE id IN (
                SELECT value FROM chapters, json_each(chapters.image_ids)
                WHERE chapters.series_id = ?
            )
            ",
        )
        .bind(id)
        .execute(self.db.pool())
        .await
        .map_err(|e| StoreError::query("deleting series images", e))?;

        sqlx::query(r"DELETE FROM chapters WHERE series_id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await
            .map_err(|e| StoreError::query("deleting series chapters", e))?;

        sqlx::query(r"DELETE FROM series WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await
            .map_err(|e| StoreError::query("deleting series", e))?;

        Ok(())
    }

    #[instrument(skip(self, images), fields(count = images.len()))]
    async fn insert_images(&self, images: &[ImageRecord]) -> Result<(), StoreError> {
        for image in images {
            sqlx::query(
                r"
                INSERT INTO images (id, payload, downloaded_at)
                VALUES (?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    payload = excluded.payload,
                    downloaded_at = excluded.downloaded_at
                ",
            )
            .bind(&image.id)
            .bind(&image.payload)
            .bind(image.downloaded_at.to_rfc3339())
            .execute(self.db.pool())
            .await
            .map_err(|e| StoreError::query("inserting image", e))?;
        }
        Ok(())
    }

    #[instrument(skip(self, chapter), fields(chapter_hid = %chapter.hid))]
    async fn insert_chapter(&self, chapter: &LocalChapter) -> Result<(), StoreError> {
        let image_ids = encode_json(&chapter.image_ids, "image ids")?;
        sqlx::query(
            r"
            INSERT INTO chapters (
                chapter_hid, series_id, chapter_number, chapter, translator,
                image_ids, downloaded_at, source_updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(chapter_hid) DO UPDATE SET
                series_id = excluded.series_id,
                chapter_number = excluded.chapter_number,
                chapter = excluded.chapter,
                translator = excluded.translator,
                image_ids = excluded.image_ids,
                downloaded_at = excluded.downloaded_at,
                source_updated_at = excluded.source_updated_at
            ",
        )
        .bind(&chapter.hid)
        .bind(&chapter.series_id)
        .bind(chapter.chapter_number)
        .bind(&chapter.chapter)
        .bind(&chapter.translator)
        .bind(&image_ids)
        .bind(chapter.downloaded_at.to_rfc3339())
        .bind(chapter.source_updated_at.map(|t| t.to_rfc3339()))
        .execute(self.db.pool())
        .await
        .map_err(|e| StoreError::query("inserting chapter", e))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_chapters(&self, series_id: &str) -> Result<Vec<LocalChapter>, StoreError> {
        let rows = sqlx::query_as::<_, ChapterRow>(
            r"SELECT * FROM chapters WHERE series_id = ? ORDER BY chapter_number",
        )
        .bind(series_id)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| StoreError::query("listing chapters", e))?;

        rows.into_iter().map(Self::chapter_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn delete_chapter(
        &self,
        series_id: &str,
        chapter_hid: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            DELETE FROM images WHERE id IN (
                SELECT value FROM chapters, json_each(chapters.image_ids)
                WHERE chapters.series_id = ? AND chapters.chapter_hid = ?
            )
            ",
        )
        .bind(series_id)
        .bind(chapter_hid)
        .execute(self.db.pool())
        .await
        .map_err(|e| StoreError::query("deleting chapter images", e))?;

        sqlx::query(r"DELETE FROM chapters WHERE series_id = ? AND chapter_hid = ?")
            .bind(series_id)
            .bind(chapter_hid)
            .execute(self.db.pool())
            .await
            .map_err(|e| StoreError::query("deleting chapter", e))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_image(&self, id: &str) -> Result<Option<ImageRecord>, StoreError> {
        let row: Option<(String, Vec<u8>, String)> = sqlx::query_as(
            r"SELECT id, payload, downloaded_at FROM images WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| StoreError::query("loading image", e))?;

        row.map(|(id, payload, downloaded_at)| {
            Ok(ImageRecord {
                id,
                payload,
                downloaded_at: parse_timestamp("downloaded_at", &downloaded_at)?,
            })
        })
        .transpose()
    }
}

fn encode_json<T: serde::Serialize>(value: &T, context: &str) -> Result<String, StoreError> {
    serde_json::to_string(value)
        .map_err(|e| StoreError::serialization(format!("encode {context}"), e))
}

fn decode_json<T: serde::de::DeserializeOwned>(
    raw: &str,
    context: &str,
) -> Result<T, StoreError> {
    serde_json::from_str(raw)
        .map_err(|e| StoreError::serialization(format!("decode {context}"), e))
}

fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| StoreError::invalid_timestamp(column, raw))
}

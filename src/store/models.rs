//! Persisted representations of series, chapters, and image payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::select::{TranslatorInfo, TranslatorPreferences};

/// A series in the local library.
///
/// `downloaded_chapters` is derived state: it is recomputed from the
/// chapter rows on every read, so a crash between an image write and a
/// chapter write can never leave it lying.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalSeries {
    /// Stable remote series id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// URL slug.
    pub slug: String,
    /// Cover image URL.
    pub cover_url: String,
    /// Best-known total chapter count; never decreases.
    pub total_chapters: u32,
    /// Chapter numbers with a persisted chapter row, ascending.
    pub downloaded_chapters: Vec<f64>,
    /// When this row was last written.
    pub last_updated: DateTime<Utc>,
    /// Raw series descriptor snapshot from the remote.
    pub info: serde_json::Value,
    /// Translator snapshot captured at the last sync.
    pub translators: Vec<TranslatorInfo>,
    /// Selection preferences for this series.
    pub preferences: Option<TranslatorPreferences>,
    /// Last chapter the reader opened, if any.
    pub last_read_chapter: Option<f64>,
    /// Chapters below this number are never offered for download.
    pub min_chapter_floor: Option<f64>,
}

/// One downloaded chapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalChapter {
    /// Release id of the chosen release.
    pub hid: String,
    /// Owning series id.
    pub series_id: String,
    /// Parsed chapter number, used for ordering and set membership.
    pub chapter_number: f64,
    /// Chapter number exactly as the source rendered it ("10.0" and
    /// "10" parse the same but display differently).
    pub chapter: String,
    /// Translator attributed to the chosen release.
    pub translator: String,
    /// Image storage ids in page order.
    pub image_ids: Vec<String>,
    /// When the chapter finished downloading.
    pub downloaded_at: DateTime<Utc>,
    /// The release's creation time on the remote, if known.
    pub source_updated_at: Option<DateTime<Utc>>,
}

/// A stored image payload.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    /// Storage id, `{chapter_hid}-{b2key}`.
    pub id: String,
    /// Raw image bytes.
    pub payload: Vec<u8>,
    /// When the payload was stored.
    pub downloaded_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_local_series_round_trips_through_json() {
        let series = LocalSeries {
            id: "s1".into(),
            title: "Test".into(),
            slug: "test".into(),
            cover_url: String::new(),
            total_chapters: 10,
            downloaded_chapters: vec![1.0, 2.5],
            last_updated: Utc::now(),
            info: serde_json::json!({"hid": "s1"}),
            translators: Vec::new(),
            preferences: None,
            last_read_chapter: Some(2.5),
            min_chapter_floor: None,
        };
        let json = serde_json::to_string(&series).unwrap();
        let back: LocalSeries = serde_json::from_str(&json).unwrap();
        assert_eq!(back.downloaded_chapters, series.downloaded_chapters);
        assert_eq!(back.last_read_chapter, Some(2.5));
    }
}

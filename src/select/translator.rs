//! Translator attribution and per-series translator snapshots.

use serde::{Deserialize, Serialize};

use crate::api::ChapterRecord;

use super::parse_chapter_number;

/// Sentinel attribution when no contributor information is present.
pub const UNKNOWN_TRANSLATOR: &str = "Unknown";

/// Read-only snapshot of one translator's releases within a series.
///
/// Recomputed on demand from the full chapter listing; never
/// authoritative state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatorInfo {
    /// Resolved translator name.
    pub name: String,
    /// Ascending chapter numbers attributed to this name.
    pub chapters: Vec<f64>,
    /// Highest chapter number attributed to this name.
    pub latest_chapter: f64,
}

/// Per-series translator preferences driving release selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatorPreferences {
    /// The preferred translator; always wins when present for a chapter.
    pub primary: String,
    /// Ordered fallback translators.
    #[serde(default)]
    pub backups: Vec<String>,
    /// Whether a backup may be chosen when the primary is absent.
    #[serde(default)]
    pub allow_backup_override: bool,
}

impl TranslatorPreferences {
    /// Convenience constructor for a primary-only preference.
    #[must_use]
    pub fn primary_only(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            backups: Vec::new(),
            allow_backup_override: false,
        }
    }

    /// Returns true when `name` is the primary or an allowed backup.
    #[must_use]
    pub fn accepts(&self, name: &str) -> bool {
        self.primary == name || self.backups.iter().any(|b| b == name)
    }
}

/// Resolves the attributed translator for a chapter record.
///
/// Fixed fallback chain, first match wins: the title of the first linked
/// contributor-group entry, then the first raw group name, then the
/// uploader identity's username, then the literal
/// [`UNKNOWN_TRANSLATOR`] sentinel.
#[must_use]
pub fn translator_name(record: &ChapterRecord) -> &str {
    if let Some(group) = record
        .md_chapters_groups
        .first()
        .and_then(|link| link.md_groups.as_ref())
    {
        return &group.title;
    }

    if let Some(name) = record.group_name.as_ref().and_then(|names| names.first()) {
        return name;
    }

    if let Some(traits) = record.identities.as_ref().and_then(|id| id.traits.as_ref()) {
        return &traits.username;
    }

    UNKNOWN_TRANSLATOR
}

/// Builds translator snapshots from a (single-language) chapter listing.
///
/// Records with non-numeric chapter values are skipped. The result is
/// sorted by latest chapter, descending, so the most active translator
/// comes first.
#[must_use]
pub fn translator_snapshot(records: &[ChapterRecord]) -> Vec<TranslatorInfo> {
    let mut by_name: Vec<(String, Vec<f64>)> = Vec::new();

    for record in records {
        let Some(number) = parse_chapter_number(&record.chap) else {
            continue;
        };
        let name = translator_name(record);
        match by_name.iter_mut().find(|(n, _)| n == name) {
            Some((_, chapters)) => chapters.push(number),
            None => by_name.push((name.to_string(), vec![number])),
        }
    }

    let mut snapshot: Vec<TranslatorInfo> = by_name
        .into_iter()
        .map(|(name, mut chapters)| {
            chapters.sort_by(|a, b| a.total_cmp(b));
            let latest_chapter = chapters.last().copied().unwrap_or(0.0);
            TranslatorInfo {
                name,
                chapters,
                latest_chapter,
            }
        })
        .collect();

    snapshot.sort_by(|a, b| b.latest_chapter.total_cmp(&a.latest_chapter));
    snapshot
}

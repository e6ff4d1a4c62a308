//! Global translator ranking maintenance.
//!
//! The ranking is an ordered list of translator names kept alongside a
//! series. It seeds the per-series preferences (first entry becomes the
//! primary, the rest become backups) and is refreshed against the live
//! translator snapshot on every update.

use super::translator::TranslatorInfo;

/// Builds a default ranking from a translator snapshot.
///
/// Translators are ranked by the number of chapters they have released,
/// descending; ties keep snapshot order.
#[must_use]
pub fn default_rankings(snapshot: &[TranslatorInfo]) -> Vec<String> {
    let mut ranked: Vec<&TranslatorInfo> = snapshot.iter().collect();
    ranked.sort_by(|a, b| b.chapters.len().cmp(&a.chapters.len()));
    ranked.iter().map(|info| info.name.clone()).collect()
}

/// Merges an existing ranking with a fresh translator snapshot.
///
/// Ranked translators that still appear in the snapshot keep their
/// relative order; translators that vanished are dropped; newly seen
/// translators are appended, ordered by chapter volume descending.
#[must_use]
pub fn merge_rankings(existing: &[String], snapshot: &[TranslatorInfo]) -> Vec<String> {
    let mut merged: Vec<String> = existing
        .iter()
        .filter(|name| snapshot.iter().any(|info| info.name == **name))
        .cloned()
        .collect();

    let mut newcomers: Vec<&TranslatorInfo> = snapshot
        .iter()
        .filter(|info| !existing.contains(&info.name))
        .collect();
    newcomers.sort_by(|a, b| b.chapters.len().cmp(&a.chapters.len()));
    merged.extend(newcomers.iter().map(|info| info.name.clone()));

    merged
}

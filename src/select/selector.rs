//! Release selection: one release per chapter number.

use tracing::debug;

use crate::api::ChapterRecord;

use super::translator::{translator_name, TranslatorPreferences};
use super::parse_chapter_number;

/// One chapter chosen for download, with its resolved attribution.
#[derive(Debug, Clone)]
pub struct SelectedRelease {
    /// Parsed chapter number.
    pub number: f64,
    /// The winning release record.
    pub record: ChapterRecord,
    /// Resolved translator attributed to the winning release.
    pub translator: String,
}

/// Picks exactly one release per chapter number.
///
/// For each distinct chapter number, the primary translator's release
/// wins when present. Otherwise, if backup override is enabled, the
/// first matching backup (in preference order) wins. Otherwise the
/// first release in input order is taken, so no chapter is ever skipped
/// for lacking a preferred translator. Records whose chapter value has
/// no numeric prefix are discarded.
///
/// The result is sorted by chapter number, ascending.
#[must_use]
pub fn select_releases(
    records: &[ChapterRecord],
    prefs: &TranslatorPreferences,
) -> Vec<SelectedRelease> {
    // Chapter numbers keyed by bit pattern; parse_chapter_number never
    // yields NaN so distinct patterns mean distinct numbers.
    let mut groups: Vec<(f64, Vec<&ChapterRecord>)> = Vec::new();

    for record in records {
        let Some(number) = parse_chapter_number(&record.chap) else {
            debug!(hid = %record.hid, chap = %record.chap, "discarding non-numeric chapter");
            continue;
        };
        match groups
            .iter_mut()
            .find(|(n, _)| n.to_bits() == number.to_bits())
        {
            Some((_, releases)) => releases.push(record),
            None => groups.push((number, Vec::from([record]))),
        }
    }

    let mut selected: Vec<SelectedRelease> = groups
        .into_iter()
        .map(|(number, releases)| {
            let record = pick_release(&releases, prefs);
            SelectedRelease {
                number,
                translator: translator_name(record).to_string(),
                record: record.clone(),
            }
        })
        .collect();

    selected.sort_by(|a, b| a.number.total_cmp(&b.number));
    selected
}

fn pick_release<'a>(
    releases: &[&'a ChapterRecord],
    prefs: &TranslatorPreferences,
) -> &'a ChapterRecord {
    if let Some(primary) = releases
        .iter()
        .find(|r| translator_name(r) == prefs.primary)
    {
        return primary;
    }

    if prefs.allow_backup_override {
        for backup in &prefs.backups {
            if let Some(release) = releases.iter().find(|r| translator_name(r) == *backup) {
                return release;
            }
        }
    }

    // Input order is the remote listing order; the first release stands
    // in when no preferred translator covers this chapter.
    releases[0]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(hid: &str, chap: &str, group: &str) -> ChapterRecord {
        serde_json::from_value(serde_json::json!({
            "hid": hid,
            "chap": chap,
            "lang": "en",
            "group_name": [group]
        }))
        .unwrap()
    }

    #[test]
    fn test_primary_release_wins() {
        let records = vec![
            record("b1", "1", "Backup"),
            record("p1", "1", "Primary"),
        ];
        let prefs = TranslatorPreferences {
            primary: "Primary".into(),
            backups: vec!["Backup".into()],
            allow_backup_override: true,
        };
        let selected = select_releases(&records, &prefs);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].record.hid, "p1");
        assert_eq!(selected[0].translator, "Primary");
    }

    #[test]
    fn test_backup_wins_only_with_override() {
        let records = vec![
            record("o1", "1", "Other"),
            record("b1", "1", "Backup"),
        ];
        let mut prefs = TranslatorPreferences {
            primary: "Primary".into(),
            backups: vec!["Backup".into()],
            allow_backup_override: true,
        };
        let selected = select_releases(&records, &prefs);
        assert_eq!(selected[0].record.hid, "b1");

        prefs.allow_backup_override = false;
        let selected = select_releases(&records, &prefs);
        // Without override, first-in-input-order stands in.
        assert_eq!(selected[0].record.hid, "o1");
    }

    #[test]
    fn test_backup_order_respected() {
        let records = vec![
            record("b2", "1", "SecondBackup"),
            record("b1", "1", "FirstBackup"),
        ];
        let prefs = TranslatorPreferences {
            primary: "Primary".into(),
            backups: vec!["FirstBackup".into(), "SecondBackup".into()],
            allow_backup_override: true,
        };
        let selected = select_releases(&records, &prefs);
        assert_eq!(selected[0].record.hid, "b1");
    }

    #[test]
    fn test_no_chapter_skipped_for_lacking_preferred_translator() {
        let records = vec![
            record("p1", "1", "Primary"),
            record("x2", "2", "SomeoneElse"),
        ];
        let prefs = TranslatorPreferences::primary_only("Primary");
        let selected = select_releases(&records, &prefs);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[1].record.hid, "x2");
        assert_eq!(selected[1].translator, "SomeoneElse");
    }

    #[test]
    fn test_output_sorted_ascending_regardless_of_input_order() {
        let records = vec![
            record("c10", "10", "G"),
            record("c2", "2", "G"),
            record("c2_5", "2.5", "G"),
        ];
        let prefs = TranslatorPreferences::primary_only("G");
        let selected = select_releases(&records, &prefs);
        let numbers: Vec<f64> = selected.iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec![2.0, 2.5, 10.0]);
    }

    #[test]
    fn test_non_numeric_chapters_discarded() {
        let records = vec![record("cx", "extra", "G"), record("c1", "1", "G")];
        let prefs = TranslatorPreferences::primary_only("G");
        let selected = select_releases(&records, &prefs);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].record.hid, "c1");
    }

    #[test]
    fn test_exactly_one_release_per_number() {
        let records = vec![
            record("a", "7", "A"),
            record("b", "7", "B"),
            record("c", "7", "C"),
        ];
        let prefs = TranslatorPreferences::primary_only("B");
        let selected = select_releases(&records, &prefs);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].record.hid, "b");
    }
}

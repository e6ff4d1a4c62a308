//! Release selection and translator attribution.
//!
//! Pure functions over the remote chapter listing: parsing chapter
//! numbers, resolving translator names, picking one release per chapter
//! number, and maintaining translator rankings. Nothing in this module
//! touches the network or the store.

mod ranking;
mod selector;
mod translator;

pub use ranking::{default_rankings, merge_rankings};
pub use selector::{select_releases, SelectedRelease};
pub use translator::{
    translator_name, translator_snapshot, TranslatorInfo, TranslatorPreferences,
    UNKNOWN_TRANSLATOR,
};

/// Parses a chapter number from its display string.
///
/// Takes the longest leading prefix that forms a decimal number and
/// ignores whatever trails it, so `"12.5-extra"` parses as `12.5`.
/// Returns `None` when no numeric prefix exists. Never returns NaN or
/// an infinity.
#[must_use]
pub fn parse_chapter_number(chap: &str) -> Option<f64> {
    let trimmed = chap.trim_start();
    let mut end = 0;
    let mut seen_dot = false;

    for (idx, c) in trimmed.char_indices() {
        match c {
            '0'..='9' => end = idx + 1,
            '-' | '+' if idx == 0 => end = idx + 1,
            '.' if !seen_dot => {
                seen_dot = true;
                end = idx + 1;
            }
            _ => break,
        }
    }

    trimmed[..end]
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::parse_chapter_number;

    #[test]
    fn test_parse_plain_integer() {
        assert_eq!(parse_chapter_number("12"), Some(12.0));
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_chapter_number("12.5"), Some(12.5));
    }

    #[test]
    fn test_parse_takes_numeric_prefix() {
        assert_eq!(parse_chapter_number("12.5-extra"), Some(12.5));
        assert_eq!(parse_chapter_number("3b"), Some(3.0));
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        assert_eq!(parse_chapter_number("extra"), None);
        assert_eq!(parse_chapter_number(""), None);
        assert_eq!(parse_chapter_number("-"), None);
        assert_eq!(parse_chapter_number("."), None);
    }

    #[test]
    fn test_parse_handles_leading_whitespace_and_sign() {
        assert_eq!(parse_chapter_number("  7"), Some(7.0));
        assert_eq!(parse_chapter_number("-1"), Some(-1.0));
    }

    #[test]
    fn test_parse_stops_at_second_dot() {
        assert_eq!(parse_chapter_number("1.2.3"), Some(1.2));
    }
}

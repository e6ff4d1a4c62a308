//! Confirmation gate for future-dated chapters.
//!
//! Some releases carry a publish time in the future: the listing knows
//! about them but the asset host will not serve their pages yet. The
//! engine never downloads them silently; the caller decides through a
//! [`FutureChapterGate`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A selected chapter whose release lies in the future.
#[derive(Debug, Clone)]
pub struct FutureChapter {
    /// Parsed chapter number.
    pub number: f64,
    /// When the release becomes available.
    pub available_at: DateTime<Utc>,
}

/// Decides whether future-dated chapters should be attempted anyway.
#[async_trait]
pub trait FutureChapterGate: Send + Sync {
    /// Returns true to include the pending chapters in the download,
    /// false to decline.
    async fn confirm(&self, pending: &[FutureChapter]) -> bool;
}

/// Gate with a fixed answer, for non-interactive callers and tests.
#[derive(Debug, Clone, Copy)]
pub struct StaticGate(pub bool);

#[async_trait]
impl FutureChapterGate for StaticGate {
    async fn confirm(&self, _pending: &[FutureChapter]) -> bool {
        self.0
    }
}

/// Formats the wait until a future release, for prompts and logs.
///
/// Rounds down to the largest sensible unit: days, then hours, then
/// minutes. Anything under a minute (or already past) reads as
/// "less than a minute".
#[must_use]
pub fn format_time_until(now: DateTime<Utc>, available_at: DateTime<Utc>) -> String {
    let remaining = available_at - now;
    let minutes = remaining.num_minutes();

    if minutes < 1 {
        return "less than a minute".to_string();
    }
    let days = remaining.num_days();
    if days >= 1 {
        let plural = if days == 1 { "" } else { "s" };
        return format!("{days} day{plural}");
    }
    let hours = remaining.num_hours();
    if hours >= 1 {
        let plural = if hours == 1 { "" } else { "s" };
        return format!("{hours} hour{plural}");
    }
    let plural = if minutes == 1 { "" } else { "s" };
    format!("{minutes} minute{plural}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        "2026-01-01T00:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_format_time_until_days() {
        assert_eq!(format_time_until(now(), now() + Duration::days(3)), "3 days");
        assert_eq!(
            format_time_until(now(), now() + Duration::hours(25)),
            "1 day"
        );
    }

    #[test]
    fn test_format_time_until_hours_and_minutes() {
        assert_eq!(
            format_time_until(now(), now() + Duration::hours(5)),
            "5 hours"
        );
        assert_eq!(
            format_time_until(now(), now() + Duration::minutes(1)),
            "1 minute"
        );
        assert_eq!(
            format_time_until(now(), now() + Duration::minutes(45)),
            "45 minutes"
        );
    }

    #[test]
    fn test_format_time_until_imminent_or_past() {
        assert_eq!(
            format_time_until(now(), now() + Duration::seconds(30)),
            "less than a minute"
        );
        assert_eq!(
            format_time_until(now(), now() - Duration::hours(1)),
            "less than a minute"
        );
    }

    #[tokio::test]
    async fn test_static_gate_answers() {
        let pending = vec![FutureChapter {
            number: 10.0,
            available_at: now(),
        }];
        assert!(StaticGate(true).confirm(&pending).await);
        assert!(!StaticGate(false).confirm(&pending).await);
    }
}

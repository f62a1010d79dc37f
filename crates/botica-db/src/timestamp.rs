//! Timestamp text format shared by both stores.
//!
//! Always UTC, millisecond precision, `Z` suffix:
//! `2025-03-01T14:05:09.120Z`. The fixed width makes text comparison agree
//! with time order, which the last-writer-wins upserts rely on. Matches the
//! `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')` column defaults.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{DbError, DbResult};

pub fn to_db_text(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_text() -> String {
    to_db_text(Utc::now())
}

/// Parses a stored timestamp. Accepts any RFC 3339 offset.
pub fn parse_db_text(text: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::Internal(format!("bad timestamp '{}': {}", text, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_is_fixed_width() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 14, 5, 9).unwrap();
        assert_eq!(to_db_text(at), "2025-03-01T14:05:09.000Z");
        assert_eq!(parse_db_text("2025-03-01T14:05:09.000Z").unwrap(), at);
        assert_eq!(parse_db_text("2025-03-01T09:05:09-05:00").unwrap(), at);
        assert!(parse_db_text("yesterday").is_err());
    }

    #[test]
    fn test_text_order_matches_time_order() {
        let early = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let late = early + chrono::Duration::milliseconds(5);
        assert!(to_db_text(early) < to_db_text(late));
    }
}

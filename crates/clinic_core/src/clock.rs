//! Wall-clock helpers shared by services.
//!
//! Persisted instants are Unix epoch milliseconds; calendar days are local
//! `YYYY-MM-DD` strings so they compare lexicographically in SQL.

use chrono::format::{Item, StrftimeItems};
use chrono::{Local, NaiveDate, TimeZone, Utc};
use log::warn;
use std::fmt::Write;

/// Current instant in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Today's local calendar day key.
pub fn today_key() -> String {
    day_key(Local::now().date_naive())
}

/// Formats a calendar day as the storage key (`YYYY-MM-DD`).
pub fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

/// Renders an epoch-ms instant in local time with a strftime pattern.
///
/// A malformed pattern falls back to RFC 3339 instead of failing.
pub fn local_timestamp_label(epoch_ms: i64, format: &str) -> String {
    let Some(instant) = Local.timestamp_millis_opt(epoch_ms).single() else {
        return epoch_ms.to_string();
    };

    let mut label = String::new();
    if write!(label, "{}", instant.format(format)).is_err() {
        warn!("event=timestamp_label module=clock status=error error_code=invalid_format");
        return instant.to_rfc3339();
    }
    label
}

/// Returns whether a strftime pattern can be rendered without error.
pub fn is_valid_timestamp_format(format: &str) -> bool {
    !format.trim().is_empty() && !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

#[cfg(test)]
mod tests {
    use super::{day_key, is_valid_timestamp_format, local_timestamp_label};
    use chrono::NaiveDate;

    #[test]
    fn day_key_is_zero_padded_iso_date() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 7).expect("valid date");
        assert_eq!(day_key(day), "2026-03-07");
    }

    #[test]
    fn rejects_malformed_timestamp_patterns() {
        assert!(is_valid_timestamp_format("%d/%m/%Y %H:%M:%S"));
        assert!(!is_valid_timestamp_format("%Q"));
        assert!(!is_valid_timestamp_format("   "));
    }

    #[test]
    fn label_uses_requested_pattern() {
        let label = local_timestamp_label(1_700_000_000_000, "%Y");
        assert_eq!(label.len(), 4);
    }

    #[test]
    fn malformed_pattern_falls_back_to_rfc3339() {
        let label = local_timestamp_label(1_700_000_000_000, "%Q");
        assert!(chrono::DateTime::parse_from_rfc3339(&label).is_ok(), "{label}");
    }
}

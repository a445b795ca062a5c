//! Shared storage helper functions.
//!
//! Column encodings: instants are RFC3339 UTC with microseconds, dates are
//! `YYYY-MM-DD`, times of day `HH:MM`, ids are hyphenated UUID text.

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use uuid::Uuid;

use super::{Result, StorageError};

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StorageError::InvalidTimestamp(value.to_string()))
}

pub fn parse_optional_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_timestamp).transpose()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| StorageError::InvalidDate(value.to_string()))
}

pub fn parse_optional_date(value: Option<String>) -> Result<Option<NaiveDate>> {
    value.as_deref().map(parse_date).transpose()
}

pub fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

pub fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| StorageError::InvalidDate(value.to_string()))
}

pub fn parse_uuid(value: &str) -> Result<Uuid> {
    Ok(Uuid::parse_str(value)?)
}

pub fn parse_optional_uuid(value: Option<String>) -> Result<Option<Uuid>> {
    value.as_deref().map(parse_uuid).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_keeps_microseconds() {
        let ts = Utc.with_ymd_and_hms(2026, 4, 1, 9, 30, 0).unwrap()
            + chrono::Duration::microseconds(123_456);
        let text = format_timestamp(ts);
        assert_eq!(text, "2026-04-01T09:30:00.123456Z");
        assert_eq!(parse_timestamp(&text).unwrap(), ts);
    }

    #[test]
    fn test_timestamps_sort_lexically() {
        let early = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();
        assert!(format_timestamp(early) < format_timestamp(late));
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(StorageError::InvalidTimestamp(_))
        ));
        assert!(matches!(parse_date("2026-02-30"), Err(StorageError::InvalidDate(_))));
        assert!(matches!(parse_uuid("not-a-uuid"), Err(StorageError::InvalidUuid(_))));
    }

    #[test]
    fn test_time_of_day() {
        let cutoff = NaiveTime::from_hms_opt(18, 0, 0).unwrap();
        assert_eq!(format_time(cutoff), "18:00");
        assert_eq!(parse_time("18:00").unwrap(), cutoff);
        assert_eq!(parse_time("18:00:00").unwrap(), cutoff);
    }
}

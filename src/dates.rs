//! Date helpers - calendar days, `HH:MM` times and UTC timestamps.

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, SubsecRound, Utc};
use regex::Regex;

lazy_static::lazy_static! {
    static ref DATE_REGEX: Regex = Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").unwrap();
    /// 24-hour clock, two-digit hours 00-23
    static ref TIME_REGEX: Regex = Regex::new(r"^([01]\d|2[0-3]):([0-5]\d)$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DateError {
    #[error("Invalid date, expected YYYY-MM-DD")]
    InvalidDate,
    #[error("Invalid time, expected HH:MM (24-hour)")]
    InvalidTime,
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Parse a `YYYY-MM-DD` calendar day.
pub fn parse_date_only(value: &str) -> Result<NaiveDate, DateError> {
    let caps = DATE_REGEX.captures(value).ok_or(DateError::InvalidDate)?;
    let year: i32 = caps[1].parse().map_err(|_| DateError::InvalidDate)?;
    let month: u32 = caps[2].parse().map_err(|_| DateError::InvalidDate)?;
    let day: u32 = caps[3].parse().map_err(|_| DateError::InvalidDate)?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or(DateError::InvalidDate)
}

/// Parse an `HH:MM` time of day.
pub fn parse_time(value: &str) -> Result<NaiveTime, DateError> {
    let caps = TIME_REGEX.captures(value).ok_or(DateError::InvalidTime)?;
    let hours: u32 = caps[1].parse().map_err(|_| DateError::InvalidTime)?;
    let minutes: u32 = caps[2].parse().map_err(|_| DateError::InvalidTime)?;
    NaiveTime::from_hms_opt(hours, minutes, 0).ok_or(DateError::InvalidTime)
}

pub fn is_valid_time(value: &str) -> bool {
    TIME_REGEX.is_match(value)
}

/// Anchor a time of day on a calendar day, in UTC.
pub fn at_time(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    date.and_time(time).and_utc()
}

/// Combine a day with an optional `HH:MM` string. `None` stays `None`.
pub fn combine_date_and_time(
    date: NaiveDate,
    time: Option<&str>,
) -> Result<Option<DateTime<Utc>>, DateError> {
    match time {
        Some(t) => Ok(Some(at_time(date, parse_time(t)?))),
        None => Ok(None),
    }
}

/// Move an existing timestamp onto `date`, keeping its time of day.
pub fn reanchor(date: NaiveDate, existing: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    existing.map(|ts| at_time(date, ts.time()))
}

/// Midnight UTC of a calendar day, as exposed on the wire.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    at_time(date, NaiveTime::MIN)
}

/// Current time truncated to milliseconds, the precision both stores keep.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

pub fn to_storage(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn from_storage(value: &str) -> Result<DateTime<Utc>, DateError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| DateError::InvalidTimestamp(value.to_string()))
}

pub fn day_to_storage(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_only_accepts_real_days() {
        let date = parse_date_only("2025-10-05").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 10, 5).unwrap());
    }

    #[test]
    fn test_parse_date_only_rejects_bad_input() {
        assert_eq!(parse_date_only("2025-02-30"), Err(DateError::InvalidDate));
        assert_eq!(parse_date_only("10/05/2025"), Err(DateError::InvalidDate));
        assert_eq!(parse_date_only("2025-10-05T00:00"), Err(DateError::InvalidDate));
    }

    #[test]
    fn test_parse_time_bounds() {
        assert!(parse_time("00:00").is_ok());
        assert!(parse_time("23:59").is_ok());
        assert_eq!(parse_time("24:00"), Err(DateError::InvalidTime));
        assert_eq!(parse_time("9:30"), Err(DateError::InvalidTime));
        assert_eq!(parse_time("12:60"), Err(DateError::InvalidTime));
    }

    #[test]
    fn test_combine_date_and_time() {
        let date = parse_date_only("2025-10-05").unwrap();
        let combined = combine_date_and_time(date, Some("17:30")).unwrap().unwrap();
        assert_eq!(to_storage(&combined), "2025-10-05T17:30:00.000Z");
        assert_eq!(combine_date_and_time(date, None).unwrap(), None);
    }

    #[test]
    fn test_reanchor_keeps_time_of_day() {
        let old = from_storage("2025-10-05T17:30:00.000Z").unwrap();
        let moved = reanchor(parse_date_only("2025-11-01").unwrap(), Some(old)).unwrap();
        assert_eq!(to_storage(&moved), "2025-11-01T17:30:00.000Z");
        assert_eq!(reanchor(parse_date_only("2025-11-01").unwrap(), None), None);
    }

    #[test]
    fn test_storage_round_trip_keeps_millis() {
        let ts = now();
        assert_eq!(from_storage(&to_storage(&ts)).unwrap(), ts);
    }
}

use crate::config::Clock;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("failed to parse timestamp '{value}' as ISO-8601")]
    Unparseable { value: String },

    #[error("timestamp '{value}' does not exist in the local time zone")]
    NonexistentLocal { value: String },
}

/// Offset-aware layouts tried after RFC 3339.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
];

/// Layouts without an offset, read in the caller's clock.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601 timestamp into UTC.
///
/// Accepts RFC 3339 (`Z` or numeric offset), offset timestamps with a space
/// separator, naive date-times with optional fractional seconds, and bare
/// dates (midnight). Values without an offset are read in `clock`; a local
/// time repeated by a DST change resolves to its earlier instant.
pub fn parse_iso8601(value: &str, clock: Clock) -> Result<DateTime<Utc>, TimestampError> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Ok(dt.with_timezone(&Utc));
        }
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        });

    match naive {
        Some(ndt) => in_clock(&ndt, clock).ok_or_else(|| TimestampError::NonexistentLocal {
            value: value.to_string(),
        }),
        None => Err(TimestampError::Unparseable {
            value: value.to_string(),
        }),
    }
}

fn in_clock(ndt: &NaiveDateTime, clock: Clock) -> Option<DateTime<Utc>> {
    match clock {
        Clock::Utc => Some(Utc.from_utc_datetime(ndt)),
        Clock::Local => Local
            .from_local_datetime(ndt)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc)),
    }
}

/// Epoch milliseconds, dropping anything finer than a millisecond.
pub fn epoch_millis(timestamp: &DateTime<Utc>) -> i64 {
    timestamp.timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc3339_utc() {
        let result = parse_iso8601("2025-12-04T02:42:11.011Z", Clock::Utc).unwrap();
        assert_eq!(result.to_rfc3339(), "2025-12-04T02:42:11.011+00:00");
    }

    #[test]
    fn test_rfc3339_with_offset() {
        let result = parse_iso8601("2025-12-04T02:42:11+05:30", Clock::Utc).unwrap();

        // 02:42:11 at +05:30 is 21:12:11 the previous day in UTC
        assert_eq!(result.to_rfc3339(), "2025-12-03T21:12:11+00:00");
    }

    #[test]
    fn test_naive_in_utc_clock() {
        let result = parse_iso8601("2024-01-01T00:00:00", Clock::Utc).unwrap();
        assert_eq!(epoch_millis(&result), 1_704_067_200_000);
    }

    #[test]
    fn test_space_separator() {
        let result = parse_iso8601("2024-01-01 00:00:01", Clock::Utc).unwrap();
        assert_eq!(epoch_millis(&result), 1_704_067_201_000);
    }

    #[test]
    fn test_space_separator_with_offset() {
        let result = parse_iso8601("2024-01-01 01:00:00+01:00", Clock::Utc).unwrap();
        assert_eq!(epoch_millis(&result), 1_704_067_200_000);
    }

    #[test]
    fn test_bare_date_is_midnight() {
        let result = parse_iso8601("2024-01-01", Clock::Utc).unwrap();
        assert_eq!(epoch_millis(&result), 1_704_067_200_000);
    }

    #[test]
    fn test_sub_millisecond_precision_truncated() {
        let result = parse_iso8601("2024-01-01T00:00:00.123999", Clock::Utc).unwrap();
        assert_eq!(epoch_millis(&result), 1_704_067_200_123);

        let result = parse_iso8601("2024-01-01T00:00:00.000999999Z", Clock::Utc).unwrap();
        assert_eq!(epoch_millis(&result), 1_704_067_200_000);
    }

    #[test]
    fn test_millis_stay_within_one_ms_of_source() {
        for micros in [0u32, 1, 999, 1_000, 456_789, 999_999] {
            let text = format!("2023-06-15T12:30:45.{:06}", micros);
            let parsed = parse_iso8601(&text, Clock::Utc).unwrap();
            let expected = 1_686_832_245_000i64 + (micros / 1_000) as i64;
            assert_eq!(epoch_millis(&parsed), expected, "input {}", text);
        }
    }

    #[test]
    fn test_naive_defaults_to_local_clock() {
        let expected = Local
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .earliest()
            .unwrap()
            .timestamp_millis();

        let result = parse_iso8601("2024-01-01T00:00:00", Clock::default()).unwrap();
        assert_eq!(epoch_millis(&result), expected);

        let result = parse_iso8601("2024-01-01", Clock::Local).unwrap();
        assert_eq!(epoch_millis(&result), expected);
    }

    #[test]
    fn test_offset_ignores_clock() {
        let utc = parse_iso8601("2024-01-01T00:00:00Z", Clock::Utc).unwrap();
        let local = parse_iso8601("2024-01-01T00:00:00Z", Clock::Local).unwrap();
        assert_eq!(utc, local);
    }

    #[test]
    fn test_garbage_rejected() {
        let err = parse_iso8601("yesterday at noon", Clock::Utc).unwrap_err();
        assert!(matches!(err, TimestampError::Unparseable { ref value } if value == "yesterday at noon"));
    }

    #[test]
    fn test_invalid_calendar_date_rejected() {
        assert!(parse_iso8601("2024-02-30T00:00:00", Clock::Utc).is_err());
    }
}

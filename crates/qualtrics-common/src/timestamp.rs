//! UTC timestamp helpers for export windows
//!
//! The export API takes `startDate` as `YYYY-MM-DDTHH:MM:SSZ`. Replication
//! state written by older runs, or edited by hand, may carry an offset, a
//! naive datetime, or a bare date; all of them are normalized to UTC here.

use crate::error::{CommonError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Format used for `startDate` and for the replication key value
pub const EXPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Format of the configured `start_date`
pub const START_DATE_FORMAT: &str = "%Y-%m-%d";

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), START_DATE_FORMAT).map_err(|_| {
        CommonError::InvalidDate {
            value: value.to_string(),
        }
    })
}

/// Midnight UTC at the start of `date`
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Parse a timestamp into UTC.
///
/// Offsets are converted; naive datetimes and bare dates are read as UTC.
pub fn parse_utc(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, START_DATE_FORMAT) {
        return Ok(start_of_day(date));
    }

    Err(CommonError::InvalidTimestamp {
        value: value.to_string(),
    })
}

/// Render a UTC timestamp in the export API format (second precision)
pub fn format_export(value: &DateTime<Utc>) -> String {
    value.format(EXPORT_TIMESTAMP_FORMAT).to_string()
}

/// Parse then re-render in the export API format
pub fn normalize_export(value: &str) -> Result<String> {
    parse_utc(value).map(|parsed| format_export(&parsed))
}

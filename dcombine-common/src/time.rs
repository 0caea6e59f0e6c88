//! Timestamp utilities
//!
//! Remote records carry extended ISO-8601 timestamps such as
//! `2013-08-04T23:38:45.000Z`. Timestamps without an offset are taken as UTC.
//! Basic-format strings (`20130804T233845Z`) are rejected.

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse an extended ISO-8601 timestamp into UTC
pub fn parse_iso8601(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    Err(Error::Format(format!("'{}' is not in iso8601 format", value)))
}

/// True when `value` parses as an extended ISO-8601 timestamp
pub fn is_iso8601(value: &str) -> bool {
    parse_iso8601(value).is_ok()
}

/// Render a timestamp in the remote API's canonical form (millisecond precision, `Z`)
pub fn to_iso8601(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse and re-render, so equal instants compare equal as strings
pub fn normalize_iso8601(value: &str) -> Result<String> {
    parse_iso8601(value).map(|dt| to_iso8601(&dt))
}

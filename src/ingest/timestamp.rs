// src/ingest/timestamp.rs
//! Permissive timestamp parsing for fetched records.
//!
//! Sources disagree on how they store dates: epoch seconds (as numbers or
//! strings), RFC 3339, bare ISO dates and US-style dates all occur. Every
//! accepted form ends up as a `DateTime<Utc>`; naive values are taken as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

const NAIVE_DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Outcome of reading one timestamp field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampField {
    Absent,
    Parsed(DateTime<Utc>),
    /// A string that matched no known format; treated as absent.
    Unparsable(String),
    /// A JSON type that cannot carry a timestamp at all.
    Malformed,
}

impl TimestampField {
    pub fn value(&self) -> Option<DateTime<Utc>> {
        match self {
            TimestampField::Parsed(dt) => Some(*dt),
            _ => None,
        }
    }
}

fn from_epoch(secs: i64) -> Option<DateTime<Utc>> {
    if secs <= 0 {
        return None;
    }
    Utc.timestamp_opt(secs, 0).single()
}

/// Parse a timestamp string. `None` when no format matches.
pub fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(secs) = s.parse::<i64>() {
        return from_epoch(secs);
    }
    if let Ok(f) = s.parse::<f64>() {
        if f.is_finite() {
            return from_epoch(f.trunc() as i64);
        }
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    // %Y would happily read "25" as year 25, so pick the US format by width.
    let date_fmt = if s.contains('/') {
        match s.rsplit('/').next().map(str::len) {
            Some(2) => "%m/%d/%y",
            _ => "%m/%d/%Y",
        }
    } else {
        ISO_DATE_FORMAT
    };
    NaiveDate::parse_from_str(s, date_fmt)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}

/// Read a timestamp out of a loosely typed JSON value.
pub fn parse_timestamp_value(v: Option<&Value>) -> TimestampField {
    match v {
        None | Some(Value::Null) => TimestampField::Absent,
        Some(Value::Number(n)) => {
            let secs = n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64));
            match secs.and_then(from_epoch) {
                Some(dt) => TimestampField::Parsed(dt),
                None => TimestampField::Unparsable(n.to_string()),
            }
        }
        Some(Value::String(s)) if s.trim().is_empty() => TimestampField::Absent,
        Some(Value::String(s)) => match parse_timestamp_str(s) {
            Some(dt) => TimestampField::Parsed(dt),
            None => TimestampField::Unparsable(s.clone()),
        },
        Some(Value::Bool(_)) | Some(Value::Array(_)) | Some(Value::Object(_)) => {
            TimestampField::Malformed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ymd(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn epoch_number_and_string() {
        let t = Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap();
        let secs = t.timestamp();
        assert_eq!(parse_timestamp_value(Some(&json!(secs))).value(), Some(t));
        assert_eq!(parse_timestamp_value(Some(&json!(secs as f64 + 0.7))).value(), Some(t));
        assert_eq!(parse_timestamp_str(&secs.to_string()), Some(t));
    }

    #[test]
    fn iso_and_us_formats() {
        assert_eq!(parse_timestamp_str("2025-09-06"), Some(ymd(2025, 9, 6)));
        assert_eq!(parse_timestamp_str("09/06/2025"), Some(ymd(2025, 9, 6)));
        assert_eq!(parse_timestamp_str("09/06/25"), Some(ymd(2025, 9, 6)));
        assert_eq!(
            parse_timestamp_str("2025-09-06T10:30:00Z"),
            Some(Utc.with_ymd_and_hms(2025, 9, 6, 10, 30, 0).unwrap())
        );
        assert_eq!(
            parse_timestamp_str("2025-09-06T12:30:00+02:00"),
            Some(Utc.with_ymd_and_hms(2025, 9, 6, 10, 30, 0).unwrap())
        );
        assert_eq!(
            parse_timestamp_str("2025-09-06 10:30:00"),
            Some(Utc.with_ymd_and_hms(2025, 9, 6, 10, 30, 0).unwrap())
        );
    }

    #[test]
    fn garbage_is_unparsable_not_malformed() {
        assert_eq!(
            parse_timestamp_value(Some(&json!("next tuesday"))),
            TimestampField::Unparsable("next tuesday".into())
        );
        assert_eq!(parse_timestamp_value(Some(&json!(""))), TimestampField::Absent);
        assert_eq!(parse_timestamp_value(Some(&json!(null))), TimestampField::Absent);
    }

    #[test]
    fn structural_types_are_malformed() {
        assert_eq!(parse_timestamp_value(Some(&json!(true))), TimestampField::Malformed);
        assert_eq!(parse_timestamp_value(Some(&json!([1, 2]))), TimestampField::Malformed);
        assert_eq!(
            parse_timestamp_value(Some(&json!({"s": 1}))),
            TimestampField::Malformed
        );
    }
}

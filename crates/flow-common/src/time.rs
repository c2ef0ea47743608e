//! Reference-time (dtg) handling for dataset snapshots.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::{FlowError, FlowResult};

/// Parse a dataset reference time.
///
/// Supports:
/// - RFC 3339: "2024-01-15T12:00:00Z"
/// - Naive ISO 8601, assumed UTC: "2024-01-15T12:00:00" or "2024-01-15 12:00:00"
/// - Compact date-time group: "202401151200" (YYYYMMDDHHMM)
pub fn parse_reference_time(s: &str) -> FlowResult<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    if s.len() == 12 && s.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y%m%d%H%M") {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(FlowError::parse(format!("unrecognised reference time '{}'", s)))
}

/// Format a reference time as a compact date-time group (YYYYMMDDHHMM).
pub fn format_dtg(time: &DateTime<Utc>) -> String {
    time.format("%Y%m%d%H%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_rfc3339() {
        let t = parse_reference_time("2024-01-15T12:00:00Z").unwrap();
        assert_eq!(t.hour(), 12);
        assert_eq!(t.day(), 15);
    }

    #[test]
    fn test_parse_naive_assumes_utc() {
        let a = parse_reference_time("2024-01-15T06:00:00").unwrap();
        let b = parse_reference_time("2024-01-15 06:00:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.hour(), 6);
    }

    #[test]
    fn test_parse_dtg() {
        let t = parse_reference_time("202403021830").unwrap();
        assert_eq!(t.year(), 2024);
        assert_eq!(t.month(), 3);
        assert_eq!(t.day(), 2);
        assert_eq!(t.hour(), 18);
        assert_eq!(t.minute(), 30);
        assert_eq!(format_dtg(&t), "202403021830");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_reference_time("yesterday").is_err());
        assert!(parse_reference_time("2024011512").is_err());
    }
}

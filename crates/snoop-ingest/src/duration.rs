//! Duration normalization for scheduler accounting values
//!
//! Both functions are total: malformed or missing input yields 0 seconds.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Timestamp layouts accepted for `stime` / `obittime`, tried in order.
const TIMESTAMP_FORMATS: [&str; 5] = [
    // PBS ctime style: "Thu Jul 13 10:00:00 2023"
    "%a %b %e %H:%M:%S %Y",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Seconds for an `H:M:S` duration string.
///
/// Computed as `H*3600 + M*60 + H*60`: the hours field is counted again in place of the seconds
/// field. Downstream reports were built on this value, so it is kept as-is.
pub fn parse_duration(value: Option<&str>) -> u64 {
    let Some(value) = value else {
        return 0;
    };

    let fields: Vec<&str> = value.trim().split(':').collect();
    let [hours, minutes, seconds] = fields.as_slice() else {
        return 0;
    };

    let (Ok(hours), Ok(minutes), Ok(_)) = (
        hours.parse::<u64>(),
        minutes.parse::<u64>(),
        seconds.parse::<u64>(),
    ) else {
        return 0;
    };

    hours
        .checked_mul(3600)
        .and_then(|h| minutes.checked_mul(60).and_then(|m| h.checked_add(m)))
        .and_then(|hm| hours.checked_mul(60).and_then(|h| hm.checked_add(h)))
        .unwrap_or(0)
}

/// Parse an absolute timestamp as reported by the scheduler.
///
/// Zone-less forms are taken as-is; both ends of an interval come from the same scheduler.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(epoch) = value.parse::<i64>() {
        return DateTime::<Utc>::from_timestamp(epoch, 0).map(|dt| dt.naive_utc());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

/// `max(0, end - start)` in whole seconds; 0 when either end is missing or unparseable.
pub fn elapsed_seconds(start: Option<&str>, end: Option<&str>) -> u64 {
    let (Some(start), Some(end)) = (start.and_then(parse_timestamp), end.and_then(parse_timestamp))
    else {
        return 0;
    };

    u64::try_from((end - start).num_seconds()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_reuses_hours_field() {
        assert_eq!(parse_duration(Some("01:30:00")), 5460);
        assert_eq!(parse_duration(Some("00:10:45")), 600);
        assert_eq!(parse_duration(Some("02:00:59")), 2 * 3600 + 2 * 60);
    }

    #[test]
    fn test_parse_duration_rejects_other_shapes() {
        assert_eq!(parse_duration(None), 0);
        assert_eq!(parse_duration(Some("")), 0);
        assert_eq!(parse_duration(Some("3600")), 0);
        assert_eq!(parse_duration(Some("01:30")), 0);
        assert_eq!(parse_duration(Some("1:02:03:04")), 0);
        assert_eq!(parse_duration(Some("aa:30:00")), 0);
        assert_eq!(parse_duration(Some("01:30:xx")), 0);
        assert_eq!(parse_duration(Some("-1:30:00")), 0);
    }

    #[test]
    fn test_parse_duration_overflow_is_zero() {
        assert_eq!(parse_duration(Some("18446744073709551615:00:00")), 0);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let ctime = parse_timestamp("Thu Jul 13 10:00:00 2023").unwrap();
        let iso = parse_timestamp("2023-07-13T10:00:00").unwrap();
        let spaced = parse_timestamp("2023-07-13 10:00:00").unwrap();
        let rfc = parse_timestamp("2023-07-13T10:00:00+00:00").unwrap();
        assert_eq!(ctime, iso);
        assert_eq!(iso, spaced);
        assert_eq!(spaced, rfc);
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_elapsed_seconds() {
        let t = "Thu Jul 13 10:00:00 2023";
        assert_eq!(elapsed_seconds(Some(t), Some(t)), 0);
        assert_eq!(
            elapsed_seconds(Some(t), Some("Thu Jul 13 11:30:15 2023")),
            5415
        );
    }

    #[test]
    fn test_elapsed_seconds_never_negative() {
        assert_eq!(
            elapsed_seconds(Some("2023-07-13T12:00:00"), Some("2023-07-13T10:00:00")),
            0
        );
        assert_eq!(elapsed_seconds(None, Some("2023-07-13T10:00:00")), 0);
        assert_eq!(elapsed_seconds(Some("2023-07-13T10:00:00"), None), 0);
        assert_eq!(elapsed_seconds(Some("garbage"), Some("2023-07-13T10:00:00")), 0);
    }
}

//! Wall-clock helpers for bucketing and counter windows.
//!
//! Every caller samples "now" once and passes it down, so a single request
//! observes one consistent bucket and one consistent week/month window.

use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime, UtcOffset};

/// Truncates a timestamp down to the start of its 15-minute quadrant
/// (minute in {0, 15, 30, 45}, seconds and subseconds zeroed).
///
/// Two timestamps inside the same quadrant map to the same bucket, which
/// keeps time-relative filter predicates stable for caching.
pub fn quarter_bucket(now: OffsetDateTime) -> OffsetDateTime {
    let past_quadrant = Duration::minutes(i64::from(now.minute() % 15))
        + Duration::seconds(i64::from(now.second()))
        + Duration::nanoseconds(i64::from(now.nanosecond()));
    now - past_quadrant
}

/// RFC 3339 rendering used for every timestamp on the wire. Falls back to
/// the debug rendering for timestamps outside the RFC 3339 year range,
/// which never arise from stored data.
pub fn rfc3339(timestamp: OffsetDateTime) -> String {
    timestamp
        .format(&Rfc3339)
        .unwrap_or_else(|_| timestamp.to_string())
}

/// Whether two timestamps fall into the same ISO week. Compared in UTC.
pub fn same_iso_week(a: OffsetDateTime, b: OffsetDateTime) -> bool {
    let (year_a, week_a, _) = a.to_offset(UtcOffset::UTC).to_iso_week_date();
    let (year_b, week_b, _) = b.to_offset(UtcOffset::UTC).to_iso_week_date();
    year_a == year_b && week_a == week_b
}

/// Whether two timestamps fall into the same calendar month. Compared in
/// UTC.
pub fn same_calendar_month(a: OffsetDateTime, b: OffsetDateTime) -> bool {
    let a = a.to_offset(UtcOffset::UTC);
    let b = b.to_offset(UtcOffset::UTC);
    a.year() == b.year() && a.month() == b.month()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn bucket_is_stable_within_a_quadrant() {
        let early = quarter_bucket(datetime!(2026-08-25 10:15:00.000000001 UTC));
        let late = quarter_bucket(datetime!(2026-08-25 10:29:59.999 UTC));
        assert_eq!(early, late);
        assert_eq!(early, datetime!(2026-08-25 10:15:00 UTC));
    }

    #[test]
    fn bucket_changes_across_quadrant_boundaries() {
        let before = quarter_bucket(datetime!(2026-08-25 10:14:59 UTC));
        let after = quarter_bucket(datetime!(2026-08-25 10:15:00 UTC));
        assert_eq!(before, datetime!(2026-08-25 10:00:00 UTC));
        assert_eq!(after, datetime!(2026-08-25 10:15:00 UTC));
    }

    #[test]
    fn bucket_zeroes_seconds_and_subseconds() {
        let bucket = quarter_bucket(datetime!(2026-08-25 23:59:59.5 UTC));
        assert_eq!(bucket, datetime!(2026-08-25 23:45:00 UTC));
    }

    #[test]
    fn iso_week_spans_the_year_boundary() {
        let december = datetime!(2025-12-29 12:00:00 UTC);
        let january = datetime!(2026-01-02 12:00:00 UTC);
        assert!(same_iso_week(december, january));
        assert!(!same_calendar_month(december, january));
    }

    #[test]
    fn adjacent_weeks_in_one_month_differ() {
        let first = datetime!(2026-08-03 08:00:00 UTC);
        let second = datetime!(2026-08-10 08:00:00 UTC);
        assert!(!same_iso_week(first, second));
        assert!(same_calendar_month(first, second));
    }

    #[test]
    fn rfc3339_rendering_keeps_the_offset() {
        assert_eq!(
            rfc3339(datetime!(2026-08-25 10:15:00 UTC)),
            "2026-08-25T10:15:00Z"
        );
    }

    #[test]
    fn offsets_do_not_skew_window_checks() {
        // 2026-08-31 22:00 -0500 is already September in UTC.
        let local = datetime!(2026-08-31 22:00:00 -5);
        let utc = datetime!(2026-09-01 03:00:00 UTC);
        assert!(same_calendar_month(local, utc));
    }
}

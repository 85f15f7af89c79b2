use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc, Weekday,
};
use serde::Serialize;

use crate::models::AttendanceLog;

/// All calendar boundaries (day/week/month) are anchored to UTC+9 regardless of
/// the host timezone.
pub fn jst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).expect("UTC+9 is a valid offset")
}

pub const WEEKDAY_LABELS: [&str; 7] = ["月", "火", "水", "木", "金", "土", "日"];

pub fn weekday_label(weekday: Weekday) -> &'static str {
    WEEKDAY_LABELS[weekday.num_days_from_monday() as usize]
}

/// Inclusive instant range. Week periods run Monday 00:00:00 JST to
/// Sunday 23:59:59.999 JST; month periods cover the full calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Best-effort timestamp parsing for the formats the source datastore mixes
/// freely: RFC 3339, naive ISO, slash-separated sheet dates, and the verbose
/// "Thu Jan 08 2026 22:00:00 GMT+0900 (GMT+09:00)" form. Offset-free values are
/// interpreted as JST wall-clock time. Returns `None` for anything else.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    // "Thu Jan 08 2026 22:00:00 GMT+0900 (GMT+09:00)"
    if raw.contains("GMT") {
        let trimmed = match raw.find(" (") {
            Some(idx) => &raw[..idx],
            None => raw,
        };
        if let Ok(parsed) = DateTime::parse_from_str(trimmed, "%a %b %d %Y %H:%M:%S GMT%z") {
            return Some(parsed.with_timezone(&Utc));
        }
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y/%m/%d %H:%M:%S",
        "%Y/%m/%d %H:%M",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return jst()
                .from_local_datetime(&naive)
                .single()
                .map(|t| t.with_timezone(&Utc));
        }
    }

    None
}

pub fn to_jst(t: DateTime<Utc>) -> DateTime<FixedOffset> {
    t.with_timezone(&jst())
}

/// The instant at which `date` begins in JST.
pub fn jst_midnight(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_hms_opt(0, 0, 0).expect("00:00:00 is valid");
    jst()
        .from_local_datetime(&naive)
        .single()
        .expect("fixed offsets have no DST gaps")
        .with_timezone(&Utc)
}

pub fn jst_date(t: DateTime<Utc>) -> NaiveDate {
    to_jst(t).date_naive()
}

/// "YYYY/M/D" in JST, matching the sheet's unpadded date labels.
pub fn jst_date_string(t: DateTime<Utc>) -> String {
    let local = to_jst(t);
    format!("{}/{}/{}", local.year(), local.month(), local.day())
}

/// "YYYY-MM" label in JST, used for period pickers.
pub fn month_label(t: DateTime<Utc>) -> String {
    let local = to_jst(t);
    format!("{}-{:02}", local.year(), local.month())
}

pub fn start_of_day(t: DateTime<Utc>) -> DateTime<Utc> {
    jst_midnight(jst_date(t))
}

pub fn end_of_day(t: DateTime<Utc>) -> DateTime<Utc> {
    jst_midnight(jst_date(t)) + Duration::days(1) - Duration::milliseconds(1)
}

/// Monday 00:00:00.000 JST of the week containing `t`. A Sunday input maps to
/// the Monday before it, not the next week.
pub fn week_start(t: DateTime<Utc>) -> DateTime<Utc> {
    let date = jst_date(t);
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    jst_midnight(monday)
}

/// Sunday 23:59:59.999 JST of the week containing `t`.
pub fn week_end(t: DateTime<Utc>) -> DateTime<Utc> {
    week_start(t) + Duration::days(7) - Duration::milliseconds(1)
}

/// The fixed calendar week immediately before the one containing `t`. Stable
/// for every day of the current week.
pub fn last_week(t: DateTime<Utc>) -> Period {
    let this_monday = week_start(t);
    Period {
        start: this_monday - Duration::days(7),
        end: this_monday - Duration::milliseconds(1),
    }
}

/// Two calendar weeks before the one containing `t`.
pub fn week_before_last(t: DateTime<Utc>) -> Period {
    let this_monday = week_start(t);
    Period {
        start: this_monday - Duration::days(14),
        end: this_monday - Duration::days(7) - Duration::milliseconds(1),
    }
}

/// Full calendar month in JST for a "YYYY-MM" label. Handles 28/29/30/31-day
/// months and the December→January rollover.
pub fn month_range(month: &str) -> Option<Period> {
    let (year_str, month_str) = month.split_once('-')?;
    let year: i32 = year_str.parse().ok()?;
    let mon: u32 = month_str.parse().ok()?;
    let start_date = NaiveDate::from_ymd_opt(year, mon, 1)?;
    let next_month = if mon == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, mon + 1, 1)?
    };
    Some(Period {
        start: jst_midnight(start_date),
        end: jst_midnight(next_month) - Duration::milliseconds(1),
    })
}

/// Inclusive-bounds filter on each log's entry time. Unparseable entries are
/// dropped.
pub fn filter_by_date_range(
    logs: &[AttendanceLog],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<AttendanceLog> {
    logs.iter()
        .filter(|log| {
            parse_timestamp(&log.entry_time).is_some_and(|entry| entry >= start && entry <= end)
        })
        .cloned()
        .collect()
}

/// "M/D(月) - M/D(日)" display label for a week period.
pub fn format_week_period(period: &Period) -> String {
    let start = to_jst(period.start);
    let end = to_jst(period.end);
    format!(
        "{}/{}({}) - {}/{}({})",
        start.month(),
        start.day(),
        weekday_label(start.weekday()),
        end.month(),
        end.day(),
        weekday_label(end.weekday())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    pub fn jst_dt(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        let naive = NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap();
        jst().from_local_datetime(&naive).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn parses_the_datastore_timestamp_formats() {
        let naive = parse_timestamp("2025-12-25T10:00:00").unwrap();
        assert_eq!(to_jst(naive).to_string(), "2025-12-25 10:00:00 +09:00");

        let rfc = parse_timestamp("2025-12-25T01:00:00.000Z").unwrap();
        assert_eq!(to_jst(rfc).to_string(), "2025-12-25 10:00:00 +09:00");

        let slashed = parse_timestamp("2025/1/5 9:30:00").unwrap();
        assert_eq!(to_jst(slashed).to_string(), "2025-01-05 09:30:00 +09:00");

        let verbose = parse_timestamp("Thu Jan 08 2026 22:00:00 GMT+0900 (GMT+09:00)").unwrap();
        assert_eq!(to_jst(verbose).to_string(), "2026-01-08 22:00:00 +09:00");

        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("not a date").is_none());
    }

    #[test]
    fn week_start_aligns_to_monday() {
        // 2025-12-25 is a Thursday
        let thursday = jst_dt(2025, 12, 25, 15, 30, 0);
        assert_eq!(week_start(thursday), jst_dt(2025, 12, 22, 0, 0, 0));
    }

    #[test]
    fn sunday_maps_to_the_monday_before_it() {
        // 2025-12-28 is a Sunday; it belongs to the week that started 12/22
        let sunday = jst_dt(2025, 12, 28, 10, 0, 0);
        assert_eq!(week_start(sunday), jst_dt(2025, 12, 22, 0, 0, 0));
        assert_eq!(
            week_end(sunday),
            jst_dt(2025, 12, 29, 0, 0, 0) - Duration::milliseconds(1)
        );
    }

    #[test]
    fn last_week_is_stable_across_the_current_week() {
        let monday = jst_dt(2025, 12, 22, 0, 0, 0);
        let wednesday = jst_dt(2025, 12, 24, 12, 0, 0);
        let sunday = jst_dt(2025, 12, 28, 23, 59, 59);

        let expected = last_week(monday);
        assert_eq!(last_week(wednesday), expected);
        assert_eq!(last_week(sunday), expected);
        assert_eq!(expected.start, jst_dt(2025, 12, 15, 0, 0, 0));
        assert_eq!(
            expected.end,
            jst_dt(2025, 12, 22, 0, 0, 0) - Duration::milliseconds(1)
        );
    }

    #[test]
    fn week_before_last_precedes_last_week() {
        let target = jst_dt(2025, 12, 24, 12, 0, 0);
        let prev = week_before_last(target);
        assert_eq!(prev.start, jst_dt(2025, 12, 8, 0, 0, 0));
        assert_eq!(prev.end, last_week(target).start - Duration::milliseconds(1));
    }

    #[test]
    fn week_crossing_the_year_boundary() {
        // 2026-01-01 is a Thursday; its week starts Monday 2025-12-29
        let new_year = jst_dt(2026, 1, 1, 9, 0, 0);
        assert_eq!(week_start(new_year), jst_dt(2025, 12, 29, 0, 0, 0));
        assert_eq!(
            week_end(new_year),
            jst_dt(2026, 1, 5, 0, 0, 0) - Duration::milliseconds(1)
        );
    }

    #[test]
    fn month_range_handles_december_and_february() {
        let december = month_range("2025-12").unwrap();
        assert_eq!(december.start, jst_dt(2025, 12, 1, 0, 0, 0));
        assert_eq!(
            december.end,
            jst_dt(2026, 1, 1, 0, 0, 0) - Duration::milliseconds(1)
        );

        let february = month_range("2026-02").unwrap();
        assert_eq!(
            february.end,
            jst_dt(2026, 3, 1, 0, 0, 0) - Duration::milliseconds(1)
        );

        assert!(month_range("2026-13").is_none());
        assert!(month_range("garbage").is_none());
    }

    #[test]
    fn filter_by_date_range_is_inclusive() {
        let log = |entry: &str| AttendanceLog {
            entry_time: entry.to_string(),
            exit_time: None,
            place: "1".to_string(),
            name: "Test".to_string(),
        };
        let logs = vec![
            log("2025-12-20T10:00:00"),
            log("2025-12-25T09:00:00"),
            log("2025-12-26T10:00:00"),
            log("2025-12-30T08:00:00"),
            log("invalid"),
        ];

        let result = filter_by_date_range(
            &logs,
            jst_dt(2025, 12, 25, 9, 0, 0),
            jst_dt(2025, 12, 26, 10, 0, 0),
        );
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].entry_time, "2025-12-25T09:00:00");
        assert_eq!(result[1].entry_time, "2025-12-26T10:00:00");

        assert!(filter_by_date_range(&[], week_start(Utc::now()), Utc::now()).is_empty());
    }

    #[test]
    fn formats_a_week_period_label() {
        let period = last_week(jst_dt(2025, 12, 25, 12, 0, 0));
        assert_eq!(format_week_period(&period), "12/15(月) - 12/21(日)");
    }
}

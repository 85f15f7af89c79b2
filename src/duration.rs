use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::models::AttendanceLog;
use crate::period::{jst_date, jst_midnight, parse_timestamp};

/// Derived half-open presence interval. Degenerate intervals (`end <= start`)
/// are dropped before merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

const LIVE_SESSION_HOURS: i64 = 12;
const STALE_SESSION_CAP_HOURS: i64 = 4;
const CLOSING_HOUR_JST: u32 = 22;

/// Resolves the exit instant for a log.
///
/// - A present, parseable `exit_time` wins.
/// - An open session younger than 12 hours is treated as still in progress
///   ("now" is the exit).
/// - An older open session is a forgotten checkout: capped at entry + 4h or at
///   22:00 JST of the entry date, whichever comes first.
///
/// The 12h/4h/22:00 thresholds are a product heuristic and must not change.
/// Returns `None` when the entry time itself does not parse.
pub fn effective_exit_time(log: &AttendanceLog, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let entry = parse_timestamp(&log.entry_time)?;

    if let Some(raw_exit) = log.exit_time.as_deref() {
        if let Some(exit) = parse_timestamp(raw_exit) {
            return Some(exit);
        }
    }

    if now - entry < Duration::hours(LIVE_SESSION_HOURS) {
        return Some(now);
    }

    let closing = jst_midnight(jst_date(entry)) + Duration::hours(i64::from(CLOSING_HOUR_JST));
    let capped = entry + Duration::hours(STALE_SESSION_CAP_HOURS);
    Some(capped.min(closing))
}

/// Sorts by start, merges overlapping or touching intervals, and returns the
/// total covered minutes (floored). Overlapping sessions are never counted
/// twice: 09:00-11:00 plus 10:00-12:00 is 180 minutes, not 240.
pub fn merge_intervals_and_sum(mut intervals: Vec<TimeInterval>) -> i64 {
    if intervals.is_empty() {
        return 0;
    }

    intervals.sort_by_key(|i| i.start);

    let mut total_ms = 0i64;
    let mut current_start = intervals[0].start;
    let mut current_end = intervals[0].end;

    for interval in &intervals[1..] {
        if interval.start < current_end {
            if interval.end > current_end {
                current_end = interval.end;
            }
        } else {
            total_ms += (current_end - current_start).num_milliseconds();
            current_start = interval.start;
            current_end = interval.end;
        }
    }
    total_ms += (current_end - current_start).num_milliseconds();

    total_ms / 60_000
}

fn log_interval(log: &AttendanceLog, now: DateTime<Utc>) -> Option<TimeInterval> {
    let start = parse_timestamp(&log.entry_time)?;
    let end = effective_exit_time(log, now)?;
    (end > start).then_some(TimeInterval { start, end })
}

/// Effective time-in-building in minutes for one person's logs: exit inference
/// per log, then overlap merging. Malformed rows are skipped, never fatal.
pub fn effective_duration(logs: &[AttendanceLog], now: DateTime<Utc>) -> i64 {
    let intervals: Vec<TimeInterval> =
        logs.iter().filter_map(|log| log_interval(log, now)).collect();
    merge_intervals_and_sum(intervals)
}

/// Minutes spent inside `[range_start_hour, range_end_hour)` JST of each log's
/// entry date, overlap-merged. An interval straddling the range boundary
/// contributes only its clipped portion. `range_end_hour` may be 24.
pub fn duration_in_time_range(
    logs: &[AttendanceLog],
    range_start_hour: u32,
    range_end_hour: u32,
    now: DateTime<Utc>,
) -> i64 {
    let mut intervals = Vec::new();

    for log in logs {
        let Some(interval) = log_interval(log, now) else {
            continue;
        };
        let midnight = jst_midnight(jst_date(interval.start));
        let range_start = midnight + Duration::hours(i64::from(range_start_hour));
        let range_end = midnight + Duration::hours(i64::from(range_end_hour));

        let clipped_start = interval.start.max(range_start);
        let clipped_end = interval.end.min(range_end);
        if clipped_end > clipped_start {
            intervals.push(TimeInterval {
                start: clipped_start,
                end: clipped_end,
            });
        }
    }

    merge_intervals_and_sum(intervals)
}

/// Duration of one log in minutes, floored, never negative.
pub fn single_log_duration(log: &AttendanceLog, now: DateTime<Utc>) -> i64 {
    let Some(entry) = parse_timestamp(&log.entry_time) else {
        return 0;
    };
    let Some(exit) = effective_exit_time(log, now) else {
        return 0;
    };
    ((exit - entry).num_milliseconds() / 60_000).max(0)
}

/// Number of distinct JST calendar dates with at least one entry.
pub fn count_unique_visit_days(logs: &[AttendanceLog]) -> usize {
    let days: HashSet<NaiveDate> = logs
        .iter()
        .filter_map(|log| parse_timestamp(&log.entry_time).map(jst_date))
        .collect();
    days.len()
}

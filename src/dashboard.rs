use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::duration::{count_unique_visit_days, effective_duration, single_log_duration};
use crate::models::{
    grade_order, is_exam_grade, normalize_name, AttendanceLog, DashboardSummary, HistoryRow,
    MetricLists, MetricWithTrend, Person, StudentDetailEntry, StudentDetails, StudentStats,
    STATUS_ENROLLED,
};
use crate::period::{
    end_of_day, jst_date, jst_date_string, month_label, month_range, parse_timestamp,
    start_of_day, Period,
};

/// Grade buckets accepted by the dashboard. `Exact` matches a single grade
/// label such as "高1" or "中3".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GradeFilter {
    All,
    /// High-school superset: any 高* grade plus 既卒.
    HighSchool,
    /// Junior-high superset: any 中* grade.
    JuniorHigh,
    Exam,
    NonExam,
    Exact(String),
}

impl GradeFilter {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "" | "ALL" => Self::All,
            "HS" => Self::HighSchool,
            "JHS" => Self::JuniorHigh,
            "EXAM" => Self::Exam,
            "NON_EXAM" => Self::NonExam,
            exact => Self::Exact(exact.to_string()),
        }
    }

    fn matches(&self, grade: &str) -> bool {
        match self {
            Self::All => true,
            Self::HighSchool => grade.contains('高') || grade.contains("既卒"),
            Self::JuniorHigh => grade.contains('中'),
            Self::Exam => is_exam_grade(grade),
            Self::NonExam => !is_exam_grade(grade),
            Self::Exact(label) => grade == label,
        }
    }
}

const VANISHED_MIN_MINUTES: i64 = 60;

/// Full dashboard aggregation over `[from, to]` (defaults to the current JST
/// calendar month): cohort-filtered ranking with zero-activity people
/// included, totals with trend vs the preceding equal-length window, the
/// cumulative history series, and grower/dropper/vanished lists.
pub fn get_dashboard_stats(
    logs: &[AttendanceLog],
    people: &[Person],
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    grade_filter: &GradeFilter,
    now: DateTime<Utc>,
) -> DashboardSummary {
    let current_month = month_range(&month_label(now));
    let from = from.or(current_month.map(|p| p.start)).unwrap_or(now);
    let to = to.or(current_month.map(|p| p.end)).unwrap_or(now);

    let period_days = ((end_of_day(to) - start_of_day(from)).num_milliseconds() as f64
        / 86_400_000.0)
        .ceil() as i64;

    let window = to - from;
    let prev_from = from - window;
    let prev_to = from - Duration::milliseconds(1);

    // Eligible roster: enrolled and matching the grade bucket.
    let eligible: Vec<&Person> = people
        .iter()
        .filter(|p| p.status == STATUS_ENROLLED && grade_filter.matches(&p.grade))
        .collect();
    let eligible_keys: HashSet<String> =
        eligible.iter().map(|p| normalize_name(&p.name)).collect();

    let relevant_logs: Vec<&AttendanceLog> = if eligible_keys.is_empty() {
        logs.iter().collect()
    } else {
        logs.iter()
            .filter(|l| eligible_keys.contains(&normalize_name(&l.name)))
            .collect()
    };

    let current = aggregate_stats(&relevant_logs, &eligible, from, to, now);
    let previous = aggregate_stats(&relevant_logs, &eligible, prev_from, prev_to, now);

    let student_count = current.ranking.len();
    let prev_student_count = previous.ranking.len();
    let avg_duration_per_visit = ratio(current.total_duration, current.total_visits as i64);
    let prev_avg_duration = ratio(previous.total_duration, previous.total_visits as i64);
    let avg_visits_per_student = ratio(current.total_visits as i64, student_count as i64);
    let prev_avg_visits = ratio(previous.total_visits as i64, prev_student_count as i64);

    let history = calculate_history(&relevant_logs, &current.ranking, from, to, now);
    let metric_lists = metric_lists(
        logs,
        &current,
        &previous,
        &eligible_keys,
        prev_from,
        prev_to,
        now,
    );

    DashboardSummary {
        total_duration: MetricWithTrend {
            value: current.total_duration as f64,
            trend: calculate_trend(current.total_duration as f64, previous.total_duration as f64),
        },
        total_visits: MetricWithTrend {
            value: current.total_visits as f64,
            trend: calculate_trend(current.total_visits as f64, previous.total_visits as f64),
        },
        avg_duration_per_visit: MetricWithTrend {
            value: avg_duration_per_visit,
            trend: calculate_trend(avg_duration_per_visit, prev_avg_duration),
        },
        avg_visits_per_student: MetricWithTrend {
            value: avg_visits_per_student,
            trend: calculate_trend(avg_visits_per_student, prev_avg_visits),
        },
        top_student: current.ranking.first().cloned(),
        ranking: current.ranking,
        period: Period { start: from, end: to },
        available_months: available_months(logs),
        period_days,
        history,
        metric_lists,
    }
}

struct AggregatedStats {
    ranking: Vec<StudentStats>,
    total_duration: i64,
    total_visits: usize,
}

fn aggregate_stats(
    logs: &[&AttendanceLog],
    eligible: &[&Person],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    now: DateTime<Utc>,
) -> AggregatedStats {
    let grouped = group_window_logs(logs, from, to);

    let mut ranking: Vec<StudentStats> = eligible
        .iter()
        .map(|person| {
            let key = normalize_name(&person.name);
            let person_logs = grouped.get(&key).map(Vec::as_slice).unwrap_or(&[]);
            let last_visit = person_logs
                .iter()
                .filter_map(|l| parse_timestamp(&l.entry_time).map(|t| (t, l.entry_time.clone())))
                .max_by_key(|(t, _)| *t)
                .map(|(_, raw)| raw);
            StudentStats {
                name: person.name.clone(),
                grade: Some(person.grade.clone()),
                total_duration_minutes: effective_duration(person_logs, now),
                visit_count: count_unique_visit_days(person_logs),
                last_visit,
                growth: None,
                rank: None,
            }
        })
        .collect();

    // Duration desc, then grade seniority desc, then name asc.
    ranking.sort_by(|a, b| {
        b.total_duration_minutes
            .cmp(&a.total_duration_minutes)
            .then_with(|| {
                let ga = a.grade.as_deref().map_or(-1, grade_order);
                let gb = b.grade.as_deref().map_or(-1, grade_order);
                gb.cmp(&ga)
            })
            .then_with(|| a.name.cmp(&b.name))
    });

    // Olympic ranks over the duration key only.
    let mut current_rank = 1;
    let mut prev_duration = None;
    for (index, stat) in ranking.iter_mut().enumerate() {
        if prev_duration.is_some_and(|d: i64| d != stat.total_duration_minutes) {
            current_rank = index + 1;
        }
        prev_duration = Some(stat.total_duration_minutes);
        stat.rank = Some(current_rank);
    }

    let total_duration = ranking.iter().map(|s| s.total_duration_minutes).sum();
    let total_visits = ranking.iter().map(|s| s.visit_count).sum();
    AggregatedStats {
        ranking,
        total_duration,
        total_visits,
    }
}

fn group_window_logs(
    logs: &[&AttendanceLog],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> HashMap<String, Vec<AttendanceLog>> {
    let mut grouped: HashMap<String, Vec<AttendanceLog>> = HashMap::new();
    for log in logs {
        let Some(entry) = parse_timestamp(&log.entry_time) else {
            continue;
        };
        if entry >= from && entry <= to {
            grouped
                .entry(normalize_name(&log.name))
                .or_default()
                .push((*log).clone());
        }
    }
    grouped
}

/// `(current - prev) / prev * 100`, one decimal; a previous value of zero maps
/// to 100 when there is any current activity, else 0.
fn calculate_trend(current: f64, prev: f64) -> f64 {
    if prev == 0.0 {
        return if current > 0.0 { 100.0 } else { 0.0 };
    }
    ((current - prev) / prev * 1000.0).round() / 10.0
}

fn ratio(numerator: i64, denominator: i64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        (numerator as f64 / denominator as f64 * 10.0).round() / 10.0
    }
}

/// "YYYY-MM" labels for every month with any activity, newest first. Scans all
/// logs, not the selected range, so the period picker always shows history.
fn available_months(logs: &[AttendanceLog]) -> Vec<String> {
    let months: BTreeSet<String> = logs
        .iter()
        .filter_map(|l| parse_timestamp(&l.entry_time).map(month_label))
        .collect();
    months.into_iter().rev().collect()
}

/// One cumulative row per JST calendar day in range, in floored hours, plus a
/// synthetic zero "Start" row. The timeline never extends past yesterday so a
/// future-dated range does not draw a flat line.
fn calculate_history(
    logs: &[&AttendanceLog],
    ranking: &[StudentStats],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Vec<HistoryRow> {
    let names: Vec<&str> = ranking.iter().map(|s| s.name.as_str()).collect();
    let key_to_name: HashMap<String, &str> = names
        .iter()
        .map(|&name| (normalize_name(name), name))
        .collect();

    // date string -> normalized name -> minutes
    let mut daily: HashMap<String, HashMap<&str, i64>> = HashMap::new();
    for log in logs {
        let Some(entry) = parse_timestamp(&log.entry_time) else {
            continue;
        };
        if entry < from || entry > to {
            continue;
        }
        let Some(&name) = key_to_name.get(&normalize_name(&log.name)) else {
            continue;
        };
        *daily
            .entry(jst_date_string(entry))
            .or_default()
            .entry(name)
            .or_insert(0) += single_log_duration(log, now);
    }

    let mut rows = Vec::new();
    let zero_totals: BTreeMap<String, i64> =
        names.iter().map(|&n| (n.to_string(), 0)).collect();
    rows.push(HistoryRow {
        date: "Start".to_string(),
        totals: zero_totals,
    });

    let effective_end = end_of_day(to).min(end_of_day(now - Duration::days(1)));
    let mut running: HashMap<&str, i64> = names.iter().map(|&n| (n, 0)).collect();
    let mut cursor = start_of_day(from);
    while cursor <= effective_end {
        let date = jst_date_string(cursor);
        let day_totals = daily.get(&date);
        let totals: BTreeMap<String, i64> = names
            .iter()
            .map(|&name| {
                let minutes = day_totals.and_then(|d| d.get(name)).copied().unwrap_or(0);
                let sum = running.entry(name).or_insert(0);
                *sum += minutes;
                (name.to_string(), *sum / 60)
            })
            .collect();
        rows.push(HistoryRow { date, totals });
        cursor += Duration::days(1);
    }

    rows
}

/// Growers/droppers compare each eligible person's duration to the previous
/// window; vanished lists people who logged over an hour last period but are
/// no longer in the eligible roster.
fn metric_lists(
    all_logs: &[AttendanceLog],
    current: &AggregatedStats,
    previous: &AggregatedStats,
    eligible_keys: &HashSet<String>,
    prev_from: DateTime<Utc>,
    prev_to: DateTime<Utc>,
    now: DateTime<Utc>,
) -> MetricLists {
    let prev_by_key: HashMap<String, i64> = previous
        .ranking
        .iter()
        .map(|s| (normalize_name(&s.name), s.total_duration_minutes))
        .collect();

    let mut growers = Vec::new();
    let mut droppers = Vec::new();
    for stat in &current.ranking {
        let prev = prev_by_key
            .get(&normalize_name(&stat.name))
            .copied()
            .unwrap_or(0);
        let delta = stat.total_duration_minutes - prev;
        if delta == 0 {
            continue;
        }
        let mut entry = stat.clone();
        entry.growth = Some(delta);
        if delta > 0 {
            growers.push(entry);
        } else {
            droppers.push(entry);
        }
    }
    growers.sort_by_key(|s| std::cmp::Reverse(s.growth.unwrap_or(0)));
    droppers.sort_by_key(|s| s.growth.unwrap_or(0));

    // People with previous-period activity who fell out of the eligible set:
    // their durations are not in `previous` (it only covers the roster), so
    // re-derive them from the raw logs over the same window.
    let mut off_roster: HashMap<String, (String, Vec<AttendanceLog>)> = HashMap::new();
    for log in all_logs {
        let Some(entry) = parse_timestamp(&log.entry_time) else {
            continue;
        };
        if entry < prev_from || entry > prev_to {
            continue;
        }
        let key = normalize_name(&log.name);
        if eligible_keys.contains(&key) {
            continue;
        }
        off_roster
            .entry(key)
            .or_insert_with(|| (log.name.clone(), Vec::new()))
            .1
            .push(log.clone());
    }

    let mut vanished: Vec<StudentStats> = off_roster
        .into_values()
        .filter_map(|(name, person_logs)| {
            let prev_minutes = effective_duration(&person_logs, now);
            (prev_minutes > VANISHED_MIN_MINUTES).then(|| StudentStats {
                name,
                grade: None,
                total_duration_minutes: 0,
                visit_count: 0,
                last_visit: None,
                growth: Some(-prev_minutes),
                rank: None,
            })
        })
        .collect();
    vanished.sort_by_key(|s| s.growth.unwrap_or(0));

    MetricLists {
        growers,
        droppers,
        vanished,
    }
}

/// Per-log history for one person over the trailing `days`-day window, plus
/// their longest consecutive-day run and the streak running into today.
pub fn get_student_details(
    logs: &[AttendanceLog],
    name: &str,
    days: i64,
    now: DateTime<Utc>,
) -> StudentDetails {
    let key = normalize_name(name);
    let window_start = start_of_day(now) - Duration::days(days.max(1) - 1);

    let mut entries: Vec<(DateTime<Utc>, StudentDetailEntry)> = logs
        .iter()
        .filter(|l| normalize_name(&l.name) == key)
        .filter_map(|l| {
            let entry = parse_timestamp(&l.entry_time)?;
            (entry >= window_start && entry <= end_of_day(now)).then(|| {
                (
                    entry,
                    StudentDetailEntry {
                        date: jst_date_string(entry),
                        duration_minutes: single_log_duration(l, now),
                        entry_time: l.entry_time.clone(),
                        exit_time: l.exit_time.clone().unwrap_or_default(),
                    },
                )
            })
        })
        .collect();
    entries.sort_by_key(|(t, _)| std::cmp::Reverse(*t));

    let visit_days: BTreeSet<NaiveDate> = entries
        .iter()
        .map(|(t, _)| jst_date(*t))
        .collect();

    let max_consecutive_days = longest_run(&visit_days);
    let current_streak = streak_into_today(&visit_days, jst_date(now));

    StudentDetails {
        history: entries.into_iter().map(|(_, e)| e).collect(),
        max_consecutive_days,
        current_streak,
    }
}

fn longest_run(days: &BTreeSet<NaiveDate>) -> usize {
    let mut best = 0;
    let mut run = 0;
    let mut prev: Option<NaiveDate> = None;
    for &day in days {
        run = match prev {
            Some(p) if day - p == Duration::days(1) => run + 1,
            _ => 1,
        };
        best = best.max(run);
        prev = Some(day);
    }
    best
}

/// Consecutive visit days ending today or yesterday; anything older is a
/// broken streak and counts as zero.
fn streak_into_today(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> usize {
    let mut cursor = if days.contains(&today) {
        today
    } else if days.contains(&(today - Duration::days(1))) {
        today - Duration::days(1)
    } else {
        return 0;
    };

    let mut streak = 1;
    while days.contains(&(cursor - Duration::days(1))) {
        cursor -= Duration::days(1);
        streak += 1;
    }
    streak
}

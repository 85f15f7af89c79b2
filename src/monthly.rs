use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::duration::{count_unique_visit_days, effective_duration};
use crate::models::{
    is_exam_grade, normalize_name, AttendanceLog, MonthlyRanking, Person, RankedGroup,
    RankedStudent, StudentMonthlyStats, STAFF_GRADE, STATUS_ENROLLED,
};
use crate::period::{filter_by_date_range, month_range};
use crate::ranking::{top_n_with_ties, RankableItem};

pub const EXAM_GROUP_LABEL: &str = "受験生の部";
pub const GENERAL_GROUP_LABEL: &str = "高2以下の部";

/// Per-person monthly totals for every enrolled, non-staff person. Logs are
/// matched to the roster by normalized name so inconsistent spacing in the
/// source records cannot fragment one person's statistics.
pub fn calculate_monthly_student_stats(
    logs: &[AttendanceLog],
    people: &[Person],
    now: DateTime<Utc>,
) -> Vec<StudentMonthlyStats> {
    let eligible: Vec<&Person> = people
        .iter()
        .filter(|p| p.status == STATUS_ENROLLED && p.grade != STAFF_GRADE)
        .collect();

    let mut grouped: HashMap<String, Vec<AttendanceLog>> = HashMap::new();
    let keys: std::collections::HashSet<String> =
        eligible.iter().map(|p| normalize_name(&p.name)).collect();
    for log in logs {
        let key = normalize_name(&log.name);
        if keys.contains(&key) {
            grouped.entry(key).or_default().push(log.clone());
        }
    }

    eligible
        .into_iter()
        .map(|person| {
            let person_logs = grouped
                .get(&normalize_name(&person.name))
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            StudentMonthlyStats {
                name: person.name.clone(),
                grade: person.grade.clone(),
                total_minutes: effective_duration(person_logs, now),
                attendance_days: count_unique_visit_days(person_logs),
            }
        })
        .collect()
}

/// Splits stats into exam-track and general cohorts and ranks each with
/// Olympic-style tie handling. Zero-duration people never enter the ranked
/// list but still count toward the cohort size.
pub fn group_and_rank_students(
    stats: Vec<StudentMonthlyStats>,
    top_n: usize,
) -> (RankedGroup, RankedGroup) {
    let (exam, general): (Vec<StudentMonthlyStats>, Vec<StudentMonthlyStats>) =
        stats.into_iter().partition(|s| is_exam_grade(&s.grade));

    (
        rank_group(exam, top_n, EXAM_GROUP_LABEL),
        rank_group(general, top_n, GENERAL_GROUP_LABEL),
    )
}

fn rank_group(stats: Vec<StudentMonthlyStats>, top_n: usize, label: &str) -> RankedGroup {
    let total_students = stats.len();
    let items: Vec<RankableItem<StudentMonthlyStats>> = stats
        .into_iter()
        .map(|s| RankableItem {
            value: s.total_minutes as f64,
            item: s,
        })
        .collect();

    let students: Vec<RankedStudent> = top_n_with_ties(items, top_n, Some(1.0))
        .into_iter()
        .map(|ranked| RankedStudent {
            rank: ranked.rank,
            total_hours: (ranked.item.total_minutes as f64 / 60.0 * 10.0).round() / 10.0,
            total_minutes: ranked.item.total_minutes,
            attendance_days: ranked.item.attendance_days,
            name: ranked.item.name,
            grade: ranked.item.grade,
        })
        .collect();

    RankedGroup {
        label: label.to_string(),
        students,
        total_students,
    }
}

/// Full monthly ranking for a "YYYY-MM" month in JST. `None` when the month
/// label does not parse.
pub fn get_monthly_ranking(
    logs: &[AttendanceLog],
    people: &[Person],
    month: &str,
    top_n: usize,
    now: DateTime<Utc>,
) -> Option<MonthlyRanking> {
    let period = month_range(month)?;
    let month_logs = filter_by_date_range(logs, period.start, period.end);

    let stats = calculate_monthly_student_stats(&month_logs, people, now);
    let (exam_group, general_group) = group_and_rank_students(stats, top_n);

    let (year, mon) = month.split_once('-')?;
    Some(MonthlyRanking {
        month: month.to_string(),
        month_label: format!("{year}年{mon}月"),
        exam_group,
        general_group,
        top_n,
    })
}

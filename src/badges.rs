use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::duration::{
    count_unique_visit_days, duration_in_time_range, effective_duration,
};
use crate::models::{
    is_exam_grade, normalize_name, AttendanceLog, Badge, BadgeType, Person, StudentBadgesMap,
    StudentRankingsMap, WeekPeriod, WeeklyBadges, STATUS_ENROLLED,
};
use crate::period::{filter_by_date_range, format_week_period, last_week, week_before_last};
use crate::ranking::{rank_with_ties, top_n_with_ties, RankableItem};

const MORNING_START_HOUR: u32 = 4;
const MORNING_END_HOUR: u32 = 9;
const NIGHT_START_HOUR: u32 = 20;
const NIGHT_END_HOUR: u32 = 24;
const BADGE_TOP_N: usize = 3;

#[derive(Debug)]
struct WeeklyStats {
    display_name: String,
    total_duration: i64,
    prev_total_duration: i64,
    morning_duration: i64,
    night_duration: i64,
    visit_days: usize,
}

impl WeeklyStats {
    fn growth(&self) -> i64 {
        self.total_duration - self.prev_total_duration
    }

    fn avg_per_visit_day(&self) -> f64 {
        if self.visit_days == 0 {
            0.0
        } else {
            self.total_duration as f64 / self.visit_days as f64
        }
    }
}

/// Assigns the six weekly badge categories over the fixed calendar week before
/// the one containing `target_date`, independently per cohort. The window is
/// stable for every day of the current week. `now` only drives exit-time
/// inference for open sessions.
pub fn get_weekly_badges(
    logs: &[AttendanceLog],
    people: &[Person],
    target_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> WeeklyBadges {
    let week = last_week(target_date);
    let prev_week = week_before_last(target_date);

    let week_logs = filter_by_date_range(logs, week.start, week.end);
    let prev_week_logs = filter_by_date_range(logs, prev_week.start, prev_week.end);

    // Cohort membership: enrolled people only, keyed by normalized name.
    let mut exam_group: Vec<String> = Vec::new();
    let mut general_group: Vec<String> = Vec::new();
    let mut stats: HashMap<String, WeeklyStats> = HashMap::new();

    for person in people {
        if person.status != STATUS_ENROLLED || person.grade.is_empty() {
            continue;
        }
        let key = normalize_name(&person.name);
        if is_exam_grade(&person.grade) {
            exam_group.push(key.clone());
        } else {
            general_group.push(key.clone());
        }
        stats.insert(
            key,
            WeeklyStats {
                display_name: person.name.clone(),
                total_duration: 0,
                prev_total_duration: 0,
                morning_duration: 0,
                night_duration: 0,
                visit_days: 0,
            },
        );
    }

    for (key, person_logs) in group_by_person(&week_logs, &stats) {
        let entry = stats.get_mut(&key).expect("grouped keys come from stats");
        entry.total_duration = effective_duration(&person_logs, now);
        entry.morning_duration =
            duration_in_time_range(&person_logs, MORNING_START_HOUR, MORNING_END_HOUR, now);
        entry.night_duration =
            duration_in_time_range(&person_logs, NIGHT_START_HOUR, NIGHT_END_HOUR, now);
        entry.visit_days = count_unique_visit_days(&person_logs);
    }

    for (key, person_logs) in group_by_person(&prev_week_logs, &stats) {
        let entry = stats.get_mut(&key).expect("grouped keys come from stats");
        entry.prev_total_duration = effective_duration(&person_logs, now);
    }

    let mut exam_badges = StudentBadgesMap::new();
    let mut general_badges = StudentBadgesMap::new();
    award_all(&exam_group, &stats, &mut exam_badges);
    award_all(&general_group, &stats, &mut general_badges);

    WeeklyBadges {
        total_exam_students: exam_group.len(),
        total_general_students: general_group.len(),
        exam_rankings: full_rankings(&exam_group, &stats),
        general_rankings: full_rankings(&general_group, &stats),
        exam: exam_badges,
        general: general_badges,
        period: WeekPeriod {
            label: format_week_period(&week),
            period: week,
        },
    }
}

fn group_by_person(
    logs: &[AttendanceLog],
    stats: &HashMap<String, WeeklyStats>,
) -> HashMap<String, Vec<AttendanceLog>> {
    let mut grouped: HashMap<String, Vec<AttendanceLog>> = HashMap::new();
    for log in logs {
        let key = normalize_name(&log.name);
        if stats.contains_key(&key) {
            grouped.entry(key).or_default().push(log.clone());
        }
    }
    grouped
}

fn award_all(
    group: &[String],
    stats: &HashMap<String, WeeklyStats>,
    badges: &mut StudentBadgesMap,
) {
    award(group, stats, badges, BadgeType::HeavyUser,
        |s| s.total_duration as f64,
        |s| s.total_duration > 0,
        |s| format!("{}h", s.total_duration / 60));

    award(group, stats, badges, BadgeType::EarlyBird,
        |s| s.morning_duration as f64,
        |s| s.morning_duration > 30,
        |s| format!("{}m", s.morning_duration));

    award(group, stats, badges, BadgeType::NightOwl,
        |s| s.night_duration as f64,
        |s| s.night_duration > 60,
        |s| format!("{}h", s.night_duration / 60));

    award(group, stats, badges, BadgeType::Consistent,
        |s| s.visit_days as f64,
        |s| s.visit_days >= 3,
        |s| format!("{}d", s.visit_days));

    award(group, stats, badges, BadgeType::Marathon,
        WeeklyStats::avg_per_visit_day,
        |s| s.total_duration > 0,
        |s| {
            let avg_hours = if s.visit_days == 0 {
                0
            } else {
                s.total_duration / s.visit_days as i64 / 60
            };
            format!("{avg_hours}h/d")
        });

    award(group, stats, badges, BadgeType::RisingStar,
        |s| s.growth() as f64,
        |s| s.growth() > 120,
        |s| format!("+{}h", s.growth() / 60));
}

/// Top 3 with ties for one metric; people failing the qualifying predicate get
/// no badge at all rather than a zero-value one.
fn award(
    group: &[String],
    stats: &HashMap<String, WeeklyStats>,
    badges: &mut StudentBadgesMap,
    badge_type: BadgeType,
    metric: impl Fn(&WeeklyStats) -> f64,
    qualifies: impl Fn(&WeeklyStats) -> bool,
    display: impl Fn(&WeeklyStats) -> String,
) {
    let candidates: Vec<RankableItem<&WeeklyStats>> = group
        .iter()
        .filter_map(|key| stats.get(key))
        .filter(|s| qualifies(s))
        .map(|s| RankableItem {
            value: metric(s),
            item: s,
        })
        .collect();

    for ranked in top_n_with_ties(candidates, BADGE_TOP_N, None) {
        badges
            .entry(ranked.item.display_name.clone())
            .or_default()
            .push(Badge {
                badge_type,
                rank: ranked.rank,
                value: display(ranked.item),
            });
    }
}

/// Olympic-style rank for every cohort member by total duration, zero-activity
/// people included, for "my rank / cohort size" displays.
fn full_rankings(group: &[String], stats: &HashMap<String, WeeklyStats>) -> StudentRankingsMap {
    let items: Vec<RankableItem<&WeeklyStats>> = group
        .iter()
        .filter_map(|key| stats.get(key))
        .map(|s| RankableItem {
            value: s.total_duration as f64,
            item: s,
        })
        .collect();

    rank_with_ties(items, true)
        .into_iter()
        .map(|ranked| (ranked.item.display_name.clone(), ranked.rank))
        .collect()
}

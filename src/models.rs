use std::collections::BTreeMap;

use serde::Serialize;

use crate::period::Period;

/// Single swipe-in/swipe-out session as read from the attendance datastore.
/// Timestamps are kept as raw strings; unparseable rows are skipped by the
/// analytics layer rather than rejected up front.
#[derive(Debug, Clone)]
pub struct AttendanceLog {
    pub entry_time: String,
    pub exit_time: Option<String>,
    pub place: String,
    pub name: String,
}

/// Roster entry. `status` gates ranking eligibility, `grade` determines the
/// exam-track vs general cohort split.
#[derive(Debug, Clone)]
pub struct Person {
    pub id: String,
    pub name: String,
    pub grade: String,
    pub status: String,
}

/// Point-in-time headcount sample (15-minute cadence).
#[derive(Debug, Clone, Serialize)]
pub struct OccupancySnapshot {
    pub timestamp: String,
    /// "YYYY-MM-DD"
    pub date: String,
    /// "Mon".."Sun"
    pub day: String,
    pub hour: u32,
    pub minute: u32,
    pub building1: i64,
    pub building2: i64,
    pub total: i64,
}

pub const STATUS_ENROLLED: &str = "在塾";
pub const EXAM_GRADES: [&str; 2] = ["高3", "既卒"];
pub const STAFF_GRADE: &str = "講師";

pub fn is_exam_grade(grade: &str) -> bool {
    EXAM_GRADES.contains(&grade)
}

/// Seniority used as a secondary sort key in rankings. Higher value sorts first.
pub fn grade_order(grade: &str) -> i32 {
    match grade {
        "既卒" => 7,
        "高3" => 6,
        "高2" => 5,
        "高1" => 4,
        "中3" => 3,
        "中2" => 2,
        "中1" => 1,
        "講師" => 0,
        _ => -1,
    }
}

/// Strips every kind of whitespace the source sheets contain: ASCII spaces,
/// full-width spaces (U+3000) and zero-width characters (U+200B..U+200D, U+FEFF),
/// so the same person recorded with inconsistent spacing is aggregated once.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| {
            !c.is_whitespace() && !matches!(c, '\u{200B}'..='\u{200D}' | '\u{FEFF}' | '\u{3000}')
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BadgeType {
    HeavyUser,
    EarlyBird,
    NightOwl,
    Consistent,
    Marathon,
    RisingStar,
}

impl BadgeType {
    pub fn label(self) -> &'static str {
        match self {
            Self::HeavyUser => "HEAVY_USER",
            Self::EarlyBird => "EARLY_BIRD",
            Self::NightOwl => "NIGHT_OWL",
            Self::Consistent => "CONSISTENT",
            Self::Marathon => "MARATHON",
            Self::RisingStar => "RISING_STAR",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Badge {
    #[serde(rename = "type")]
    pub badge_type: BadgeType,
    /// 1, 2, 3 (ties share a rank)
    pub rank: usize,
    /// Display value, e.g. "15h", "5d", "+4h"
    pub value: String,
}

pub type StudentBadgesMap = BTreeMap<String, Vec<Badge>>;
pub type StudentRankingsMap = BTreeMap<String, usize>;

/// Weekly badge results split by cohort, plus full total-duration rankings for
/// "my rank / cohort size" displays.
#[derive(Debug, Clone, Serialize)]
pub struct WeeklyBadges {
    pub exam: StudentBadgesMap,
    pub general: StudentBadgesMap,
    pub total_exam_students: usize,
    pub total_general_students: usize,
    pub exam_rankings: StudentRankingsMap,
    pub general_rankings: StudentRankingsMap,
    pub period: WeekPeriod,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeekPeriod {
    pub period: Period,
    /// "M/D(月) - M/D(日)"
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentStats {
    pub name: String,
    pub grade: Option<String>,
    pub total_duration_minutes: i64,
    pub visit_count: usize,
    pub last_visit: Option<String>,
    /// Delta vs the previous period in minutes (growers/droppers/vanished lists).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub growth: Option<i64>,
    /// Olympic-style rank; ties share the same rank.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<usize>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricWithTrend {
    pub value: f64,
    /// Percentage change vs the immediately preceding equal-length period.
    pub trend: f64,
}

/// One row of the cumulative history chart: running total hours per person.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRow {
    pub date: String,
    #[serde(flatten)]
    pub totals: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricLists {
    pub growers: Vec<StudentStats>,
    pub droppers: Vec<StudentStats>,
    pub vanished: Vec<StudentStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub total_duration: MetricWithTrend,
    pub total_visits: MetricWithTrend,
    pub avg_duration_per_visit: MetricWithTrend,
    pub avg_visits_per_student: MetricWithTrend,
    pub top_student: Option<StudentStats>,
    pub ranking: Vec<StudentStats>,
    pub period: Period,
    /// "YYYY-MM" labels for every month with any activity, newest first.
    pub available_months: Vec<String>,
    pub period_days: i64,
    pub history: Vec<HistoryRow>,
    pub metric_lists: MetricLists,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentDetailEntry {
    pub date: String,
    pub duration_minutes: i64,
    pub entry_time: String,
    pub exit_time: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentDetails {
    pub history: Vec<StudentDetailEntry>,
    pub max_consecutive_days: usize,
    pub current_streak: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentMonthlyStats {
    pub name: String,
    pub grade: String,
    pub total_minutes: i64,
    pub attendance_days: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedStudent {
    pub rank: usize,
    pub name: String,
    pub grade: String,
    pub total_hours: f64,
    pub total_minutes: i64,
    pub attendance_days: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedGroup {
    pub label: String,
    pub students: Vec<RankedStudent>,
    /// Everyone eligible in the cohort, including zero-duration people.
    pub total_students: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyRanking {
    pub month: String,
    pub month_label: String,
    pub exam_group: RankedGroup,
    pub general_group: RankedGroup,
    pub top_n: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_name_strips_all_space_variants() {
        assert_eq!(normalize_name("  田中 太郎  "), "田中太郎");
        assert_eq!(normalize_name("田中\u{3000}太郎"), "田中太郎");
        assert_eq!(normalize_name("田中\u{200B}太郎"), "田中太郎");
        assert_eq!(normalize_name("\u{FEFF}佐藤 \u{200D}花子\t"), "佐藤花子");
        assert_eq!(normalize_name(""), "");
        assert_eq!(normalize_name(" \t\n"), "");
        assert_eq!(normalize_name("JohnDoe"), "JohnDoe");
    }

    #[test]
    fn grade_order_ranks_seniors_first() {
        assert!(grade_order("既卒") > grade_order("高3"));
        assert!(grade_order("高3") > grade_order("中3"));
        assert!(grade_order("講師") < grade_order("中1"));
        assert_eq!(grade_order("不明"), -1);
    }

    #[test]
    fn exam_grades_are_the_two_terminal_labels() {
        assert!(is_exam_grade("高3"));
        assert!(is_exam_grade("既卒"));
        assert!(!is_exam_grade("高2"));
        assert!(!is_exam_grade("講師"));
    }
}

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::OccupancySnapshot;
use crate::period::WEEKDAY_LABELS;

pub const HOUR_MIN: u32 = 7;
pub const HOUR_MAX: u32 = 22;
const HOUR_COUNT: usize = (HOUR_MAX - HOUR_MIN + 1) as usize;

/// Weekday abbreviation → 1=Mon .. 7=Sun. Unknown labels are skipped by every
/// aggregator.
fn day_to_weekday(day: &str) -> Option<usize> {
    match day {
        "Mon" => Some(1),
        "Tue" => Some(2),
        "Wed" => Some(3),
        "Thu" => Some(4),
        "Fri" => Some(5),
        "Sat" => Some(6),
        "Sun" => Some(7),
        _ => None,
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Quarter-hour-precision time of day, e.g. 10:15 → 10.25.
fn quarter_time(hour: u32, minute: u32) -> f64 {
    ((f64::from(hour) + f64::from(minute) / 60.0) * 4.0).round() / 4.0
}

/// Weekday × hour mean-headcount matrix: rows 0=Mon..6=Sun, columns hours
/// 7..=22.
#[derive(Debug, Clone, Serialize)]
pub struct HeatmapData {
    pub matrix: Vec<Vec<f64>>,
    pub weekday_labels: Vec<&'static str>,
    pub hour_labels: Vec<u32>,
    pub max_value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendsPoint {
    pub time: f64,
    /// Mean headcount at this time of day.
    pub total: f64,
    pub p10: f64,
    pub p25: f64,
    pub p75: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendsData {
    pub weekday_mean: Vec<TrendsPoint>,
    pub weekend_mean: Vec<TrendsPoint>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BreakdownPoint {
    pub time: f64,
    pub building1: i64,
    pub building2: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyBreakdown {
    pub date: String,
    pub day: String,
    pub points: Vec<BreakdownPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisPeriod {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OccupancyAnalysis {
    pub heatmap: HeatmapData,
    pub trends: TrendsData,
    pub breakdown: Vec<DailyBreakdown>,
    pub period: AnalysisPeriod,
    pub total_days: usize,
}

/// Linear-interpolated percentile over unsorted observations. Empty input
/// yields 0; a single observation is every percentile of itself.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    if values.len() == 1 {
        return values[0];
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64)
}

/// Mean headcount per weekday × hour cell. Samples outside 07:00-22:00 are
/// excluded entirely; empty input yields an all-zero matrix.
pub fn aggregate_heatmap(snapshots: &[OccupancySnapshot]) -> HeatmapData {
    let mut sums = [[0.0f64; HOUR_COUNT]; 7];
    let mut counts = [[0usize; HOUR_COUNT]; 7];

    for snapshot in snapshots {
        if snapshot.hour < HOUR_MIN || snapshot.hour > HOUR_MAX {
            continue;
        }
        let Some(weekday) = day_to_weekday(&snapshot.day) else {
            continue;
        };
        let row = weekday - 1;
        let col = (snapshot.hour - HOUR_MIN) as usize;
        sums[row][col] += snapshot.total as f64;
        counts[row][col] += 1;
    }

    let mut max_value = 0.0f64;
    let matrix: Vec<Vec<f64>> = (0..7)
        .map(|row| {
            (0..HOUR_COUNT)
                .map(|col| {
                    let avg = if counts[row][col] > 0 {
                        sums[row][col] / counts[row][col] as f64
                    } else {
                        0.0
                    };
                    max_value = max_value.max(avg);
                    round1(avg)
                })
                .collect()
        })
        .collect();

    HeatmapData {
        matrix,
        weekday_labels: WEEKDAY_LABELS.to_vec(),
        hour_labels: (HOUR_MIN..=HOUR_MAX).collect(),
        max_value: round1(max_value),
    }
}

/// Weekday vs weekend time-of-day curves at quarter-hour precision, with a
/// mean and p10/p25/p75/p90 band per point, sorted ascending by time.
pub fn aggregate_trends(snapshots: &[OccupancySnapshot]) -> TrendsData {
    // Keyed by time * 4 so the quarter-hour grid stays an exact integer key.
    let mut weekday_values: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
    let mut weekend_values: BTreeMap<i64, Vec<f64>> = BTreeMap::new();

    for snapshot in snapshots {
        let Some(weekday) = day_to_weekday(&snapshot.day) else {
            continue;
        };
        let quarters = (quarter_time(snapshot.hour, snapshot.minute) * 4.0) as i64;
        let bucket = if weekday >= 6 {
            &mut weekend_values
        } else {
            &mut weekday_values
        };
        bucket.entry(quarters).or_default().push(snapshot.total as f64);
    }

    let to_points = |buckets: BTreeMap<i64, Vec<f64>>| -> Vec<TrendsPoint> {
        buckets
            .into_iter()
            .map(|(quarters, values)| {
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                TrendsPoint {
                    time: quarters as f64 / 4.0,
                    total: round1(mean),
                    p10: round1(percentile(&values, 10.0)),
                    p25: round1(percentile(&values, 25.0)),
                    p75: round1(percentile(&values, 75.0)),
                    p90: round1(percentile(&values, 90.0)),
                }
            })
            .collect()
    };

    TrendsData {
        weekday_mean: to_points(weekday_values),
        weekend_mean: to_points(weekend_values),
    }
}

/// One entry per distinct date, each with its time-ordered sample curve.
pub fn aggregate_breakdown(snapshots: &[OccupancySnapshot]) -> Vec<DailyBreakdown> {
    let mut by_date: BTreeMap<String, (String, Vec<BreakdownPoint>)> = BTreeMap::new();

    for snapshot in snapshots {
        let entry = by_date
            .entry(snapshot.date.clone())
            .or_insert_with(|| (snapshot.day.clone(), Vec::new()));
        entry.1.push(BreakdownPoint {
            time: quarter_time(snapshot.hour, snapshot.minute),
            building1: snapshot.building1,
            building2: snapshot.building2,
            total: snapshot.total,
        });
    }

    by_date
        .into_iter()
        .map(|(date, (day, mut points))| {
            points.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));
            DailyBreakdown { date, day, points }
        })
        .collect()
}

/// Inclusive filter on the snapshot's "YYYY-MM-DD" date field.
pub fn filter_by_date_range(
    snapshots: &[OccupancySnapshot],
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<OccupancySnapshot> {
    let from_str = from.format("%Y-%m-%d").to_string();
    let to_str = to.format("%Y-%m-%d").to_string();
    snapshots
        .iter()
        .filter(|s| s.date >= from_str && s.date <= to_str)
        .cloned()
        .collect()
}

pub fn get_occupancy_analysis(
    snapshots: &[OccupancySnapshot],
    from: NaiveDate,
    to: NaiveDate,
) -> OccupancyAnalysis {
    let filtered = filter_by_date_range(snapshots, from, to);
    let total_days = filtered
        .iter()
        .map(|s| s.date.as_str())
        .collect::<BTreeSet<_>>()
        .len();

    OccupancyAnalysis {
        heatmap: aggregate_heatmap(&filtered),
        trends: aggregate_trends(&filtered),
        breakdown: aggregate_breakdown(&filtered),
        period: AnalysisPeriod {
            from: from.format("%Y-%m-%d").to_string(),
            to: to.format("%Y-%m-%d").to_string(),
        },
        total_days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(date: &str, day: &str, hour: u32, minute: u32, total: i64) -> OccupancySnapshot {
        OccupancySnapshot {
            timestamp: format!("{date}T{hour:02}:{minute:02}:00"),
            date: date.to_string(),
            day: day.to_string(),
            hour,
            minute,
            building1: total - total / 2,
            building2: total / 2,
            total,
        }
    }

    #[test]
    fn heatmap_places_monday_ten_oclock_in_the_right_cell() {
        let data = vec![snap("2026-01-05", "Mon", 10, 0, 8)];
        let result = aggregate_heatmap(&data);
        assert_eq!(result.matrix[0][3], 8.0);
        assert_eq!(result.weekday_labels[0], "月");
        assert_eq!(result.hour_labels[3], 10);
    }

    #[test]
    fn heatmap_averages_across_matching_samples() {
        let data = vec![
            snap("2026-01-05", "Mon", 10, 0, 6),
            snap("2026-01-12", "Mon", 10, 0, 10),
        ];
        let result = aggregate_heatmap(&data);
        assert_eq!(result.matrix[0][3], 8.0);
    }

    #[test]
    fn heatmap_ignores_hours_outside_seven_to_twentytwo() {
        let data = vec![
            snap("2026-01-05", "Mon", 5, 0, 3),
            snap("2026-01-05", "Mon", 23, 0, 1),
            snap("2026-01-05", "Mon", 10, 0, 7),
        ];
        let result = aggregate_heatmap(&data);
        assert_eq!(result.matrix[0][3], 7.0);
        assert_eq!(result.max_value, 7.0);
        let grand_total: f64 = result.matrix.iter().flatten().sum();
        assert_eq!(grand_total, 7.0);
    }

    #[test]
    fn heatmap_sunday_lands_in_the_last_row() {
        let data = vec![snap("2026-01-11", "Sun", 14, 0, 12)];
        let result = aggregate_heatmap(&data);
        assert_eq!(result.matrix[6][7], 12.0);
        assert_eq!(result.weekday_labels[6], "日");
    }

    #[test]
    fn heatmap_of_nothing_is_a_zero_matrix() {
        let result = aggregate_heatmap(&[]);
        assert_eq!(result.matrix.len(), 7);
        assert_eq!(result.matrix[0].len(), 16);
        assert!(result.matrix.iter().flatten().all(|&v| v == 0.0));
        assert_eq!(result.max_value, 0.0);
    }

    #[test]
    fn percentile_edge_cases() {
        assert_eq!(percentile(&[], 50.0), 0.0);
        assert_eq!(percentile(&[7.0], 10.0), 7.0);
        assert_eq!(percentile(&[7.0], 90.0), 7.0);
    }

    #[test]
    fn percentile_median_and_quartiles() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&values, 50.0), 3.0);
        assert_eq!(percentile(&values, 25.0), 2.0);
        assert_eq!(percentile(&values, 75.0), 4.0);
    }

    #[test]
    fn percentile_interpolates_between_order_statistics() {
        assert_eq!(percentile(&[2.0, 4.0, 6.0, 8.0], 50.0), 5.0);
    }

    #[test]
    fn trends_split_weekday_from_weekend() {
        let data = vec![
            snap("2026-01-05", "Mon", 10, 0, 5),
            snap("2026-01-10", "Sat", 10, 0, 10),
        ];
        let result = aggregate_trends(&data);
        let weekday = result.weekday_mean.iter().find(|p| p.time == 10.0).unwrap();
        let weekend = result.weekend_mean.iter().find(|p| p.time == 10.0).unwrap();
        assert_eq!(weekday.total, 5.0);
        assert_eq!(weekend.total, 10.0);
    }

    #[test]
    fn trends_average_samples_at_the_same_time_of_day() {
        let data = vec![
            snap("2026-01-05", "Mon", 10, 0, 4),
            snap("2026-01-06", "Tue", 10, 0, 8),
            snap("2026-01-07", "Wed", 10, 0, 6),
        ];
        let result = aggregate_trends(&data);
        let point = result.weekday_mean.iter().find(|p| p.time == 10.0).unwrap();
        assert_eq!(point.total, 6.0);
    }

    #[test]
    fn trends_keep_quarter_hour_resolution() {
        let data = vec![
            snap("2026-01-05", "Mon", 10, 15, 5),
            snap("2026-01-05", "Mon", 10, 30, 7),
        ];
        let result = aggregate_trends(&data);
        assert!(result.weekday_mean.iter().any(|p| p.time == 10.25 && p.total == 5.0));
        assert!(result.weekday_mean.iter().any(|p| p.time == 10.5 && p.total == 7.0));
    }

    #[test]
    fn trends_carry_percentile_bands() {
        let data = vec![
            snap("2026-01-05", "Mon", 10, 0, 2),
            snap("2026-01-06", "Tue", 10, 0, 4),
            snap("2026-01-07", "Wed", 10, 0, 6),
            snap("2026-01-08", "Thu", 10, 0, 8),
            snap("2026-01-09", "Fri", 10, 0, 10),
        ];
        let result = aggregate_trends(&data);
        let point = result.weekday_mean.iter().find(|p| p.time == 10.0).unwrap();
        assert_eq!(point.total, 6.0);
        assert_eq!(point.p25, 4.0);
        assert_eq!(point.p75, 8.0);
    }

    #[test]
    fn trends_of_nothing_are_empty() {
        let result = aggregate_trends(&[]);
        assert!(result.weekday_mean.is_empty());
        assert!(result.weekend_mean.is_empty());
    }

    #[test]
    fn breakdown_groups_and_sorts_by_date() {
        let data = vec![
            snap("2026-01-07", "Wed", 10, 0, 4),
            snap("2026-01-05", "Mon", 10, 0, 5),
            snap("2026-01-06", "Tue", 11, 0, 7),
        ];
        let result = aggregate_breakdown(&data);
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].date, "2026-01-05");
        assert_eq!(result[0].day, "Mon");
        assert_eq!(result[2].date, "2026-01-07");
    }

    #[test]
    fn breakdown_points_are_time_ordered() {
        let data = vec![
            snap("2026-01-05", "Mon", 10, 15, 7),
            snap("2026-01-05", "Mon", 10, 0, 5),
        ];
        let result = aggregate_breakdown(&data);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].points[0].time, 10.0);
        assert_eq!(result[0].points[1].time, 10.25);
        assert_eq!(result[0].points[0].total, 5);
        assert!(aggregate_breakdown(&[]).is_empty());
    }

    #[test]
    fn date_filter_is_inclusive_of_both_bounds() {
        let data = vec![
            snap("2026-01-01", "Thu", 10, 0, 1),
            snap("2026-01-05", "Mon", 10, 0, 2),
            snap("2026-01-10", "Sat", 10, 0, 3),
            snap("2026-01-15", "Thu", 10, 0, 4),
            snap("2026-01-20", "Tue", 10, 0, 5),
        ];
        let from = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let result = filter_by_date_range(&data, from, to);
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].date, "2026-01-05");
        assert_eq!(result[2].date, "2026-01-15");
    }

    #[test]
    fn analysis_bundles_all_views_with_the_period() {
        let data = vec![
            snap("2026-01-05", "Mon", 10, 0, 5),
            snap("2026-01-06", "Tue", 10, 0, 7),
            snap("2026-02-01", "Sun", 10, 0, 9), // outside the window
        ];
        let from = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        let result = get_occupancy_analysis(&data, from, to);
        assert_eq!(result.total_days, 2);
        assert_eq!(result.breakdown.len(), 2);
        assert_eq!(result.period.from, "2026-01-01");
        assert_eq!(result.period.to, "2026-01-31");
    }
}

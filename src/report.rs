use std::fmt::Write;

use crate::models::{MonthlyRanking, StudentBadgesMap, WeeklyBadges};

pub fn split_minutes(total_minutes: i64) -> (i64, i64) {
    (total_minutes / 60, total_minutes % 60)
}

/// "2h 30m" style plain-text duration.
pub fn format_minutes_hm(total_minutes: i64) -> String {
    let (hours, mins) = split_minutes(total_minutes);
    format!("{hours}h {mins}m")
}

/// Markdown report combining the monthly ranking with last week's badges.
pub fn build_report(monthly: &MonthlyRanking, badges: &WeeklyBadges) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Studyroom Activity Report");
    let _ = writeln!(output, "Month: {}", monthly.month_label);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Monthly Ranking (top {})", monthly.top_n);

    for group in [&monthly.exam_group, &monthly.general_group] {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "### {} ({} students)",
            group.label, group.total_students
        );
        if group.students.is_empty() {
            let _ = writeln!(output, "No attendance recorded this month.");
        }
        for student in &group.students {
            let _ = writeln!(
                output,
                "{}. {} ({}) {}h across {} days",
                student.rank,
                student.name,
                student.grade,
                student.total_hours,
                student.attendance_days
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weekly Badges ({})", badges.period.label);

    for (label, cohort, size) in [
        ("受験生の部", &badges.exam, badges.total_exam_students),
        ("高2以下の部", &badges.general, badges.total_general_students),
    ] {
        let _ = writeln!(output);
        let _ = writeln!(output, "### {label} ({size} students)");
        write_badge_lines(&mut output, cohort);
    }

    output
}

fn write_badge_lines(output: &mut String, cohort: &StudentBadgesMap) {
    if cohort.is_empty() {
        let _ = writeln!(output, "No badges awarded this week.");
        return;
    }
    for (name, badge_list) in cohort {
        let summary: Vec<String> = badge_list
            .iter()
            .map(|b| format!("{} #{} ({})", b.badge_type.label(), b.rank, b.value))
            .collect();
        let _ = writeln!(output, "- {}: {}", name, summary.join(", "));
    }
}

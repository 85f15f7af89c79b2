use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;

mod badges;
mod dashboard;
mod db;
mod duration;
mod models;
mod monthly;
mod occupancy;
mod period;
mod ranking;
mod report;

#[derive(Parser)]
#[command(name = "studyroom-analytics")]
#[command(about = "Attendance analytics for the studyroom portal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import the student roster from a CSV file
    ImportPeople {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Import attendance logs from a CSV file
    ImportLogs {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Import occupancy snapshots from a CSV file
    ImportSnapshots {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Weekly badge awards for the last completed week
    Badges {
        /// Anchor date; badges cover the calendar week before this date's week
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        json: bool,
    },
    /// Aggregate dashboard statistics for a date window
    Dashboard {
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        /// ALL, HS, JHS, EXAM, NON_EXAM, or an exact grade label
        #[arg(long, default_value = "ALL")]
        grade: String,
        #[arg(long)]
        json: bool,
    },
    /// Monthly ranking split into exam and general cohorts
    Monthly {
        /// Month in YYYY-MM form
        #[arg(long)]
        month: String,
        #[arg(long, default_value_t = 5)]
        top: usize,
        #[arg(long)]
        json: bool,
    },
    /// Occupancy heatmap, trends and daily breakdown
    Occupancy {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(long)]
        json: bool,
    },
    /// Per-student attendance history and streaks
    Student {
        #[arg(long)]
        name: String,
        #[arg(long, default_value_t = 28)]
        days: i64,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown activity report for a month
    Report {
        /// Month in YYYY-MM form
        #[arg(long)]
        month: String,
        #[arg(long, default_value_t = 5)]
        top: usize,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    let now = Utc::now();

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportPeople { csv } => {
            let upserted = db::import_people_csv(&pool, &csv).await?;
            println!("Upserted {upserted} people from {}.", csv.display());
        }
        Commands::ImportLogs { csv } => {
            let inserted = db::import_logs_csv(&pool, &csv).await?;
            println!("Inserted {inserted} attendance logs from {}.", csv.display());
        }
        Commands::ImportSnapshots { csv } => {
            let inserted = db::import_snapshots_csv(&pool, &csv).await?;
            println!("Inserted {inserted} snapshots from {}.", csv.display());
        }
        Commands::Badges { date, json } => {
            let logs = db::fetch_logs(&pool).await?;
            let people = db::fetch_people(&pool).await?;
            let target = date.map(period::jst_midnight).unwrap_or(now);
            let result = badges::get_weekly_badges(&logs, &people, target, now);

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }

            println!("Badges for {}", result.period.label);
            for (label, cohort, total) in [
                ("Exam cohort", &result.exam, result.total_exam_students),
                ("General cohort", &result.general, result.total_general_students),
            ] {
                println!("{label} ({total} students):");
                if cohort.is_empty() {
                    println!("  (no badges awarded)");
                }
                for (name, awarded) in cohort {
                    for badge in awarded {
                        println!(
                            "  {} - {} #{} ({})",
                            name,
                            badge.badge_type.label(),
                            badge.rank,
                            badge.value
                        );
                    }
                }
            }
        }
        Commands::Dashboard {
            from,
            to,
            grade,
            json,
        } => {
            let logs = db::fetch_logs(&pool).await?;
            let people = db::fetch_people(&pool).await?;
            let filter = dashboard::GradeFilter::parse(&grade);
            let summary = dashboard::get_dashboard_stats(
                &logs,
                &people,
                from.map(period::jst_midnight),
                to.map(|d| period::end_of_day(period::jst_midnight(d))),
                &filter,
                now,
            );

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
                return Ok(());
            }

            println!(
                "Window: {} days, total {:.1} min ({:+.1}%), {} visits ({:+.1}%)",
                summary.period_days,
                summary.total_duration.value,
                summary.total_duration.trend,
                summary.total_visits.value as i64,
                summary.total_visits.trend
            );
            println!("Ranking:");
            for student in summary.ranking.iter().take(10) {
                println!(
                    "  {}. {} ({}) {} min across {} visits",
                    student.rank.unwrap_or(0),
                    student.name,
                    student.grade.as_deref().unwrap_or("-"),
                    student.total_duration_minutes,
                    student.visit_count
                );
            }
        }
        Commands::Monthly { month, top, json } => {
            let logs = db::fetch_logs(&pool).await?;
            let people = db::fetch_people(&pool).await?;
            let ranking = monthly::get_monthly_ranking(&logs, &people, &month, top, now)
                .with_context(|| format!("invalid month: {month}"))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&ranking)?);
                return Ok(());
            }

            println!("{}", ranking.month_label);
            for group in [&ranking.exam_group, &ranking.general_group] {
                println!("{} ({} students):", group.label, group.total_students);
                for student in &group.students {
                    println!(
                        "  {}. {} ({}) {:.1}h / {} days",
                        student.rank, student.name, student.grade, student.total_hours,
                        student.attendance_days
                    );
                }
            }
        }
        Commands::Occupancy { from, to, json } => {
            let snapshots = db::fetch_snapshots(&pool).await?;
            let analysis = occupancy::get_occupancy_analysis(&snapshots, from, to);

            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
                return Ok(());
            }

            println!(
                "Occupancy {} to {}: {} days of data, peak hourly average {:.1}",
                analysis.period.from,
                analysis.period.to,
                analysis.total_days,
                analysis.heatmap.max_value
            );
            for day in &analysis.breakdown {
                println!("  {}: {} samples", day.date, day.points.len());
            }
        }
        Commands::Student { name, days, json } => {
            let logs = db::fetch_logs(&pool).await?;
            let details = dashboard::get_student_details(&logs, &name, days, now);

            if json {
                println!("{}", serde_json::to_string_pretty(&details)?);
                return Ok(());
            }

            println!(
                "{name}: {} visits in the last {days} days, longest run {} days, current streak {}",
                details.history.len(),
                details.max_consecutive_days,
                details.current_streak
            );
            for entry in &details.history {
                println!(
                    "  {} {}",
                    entry.date,
                    report::format_minutes_hm(entry.duration_minutes)
                );
            }
        }
        Commands::Report { month, top, out } => {
            let logs = db::fetch_logs(&pool).await?;
            let people = db::fetch_people(&pool).await?;
            let ranking = monthly::get_monthly_ranking(&logs, &people, &month, top, now)
                .with_context(|| format!("invalid month: {month}"))?;
            let badges = badges::get_weekly_badges(&logs, &people, now, now);
            let report = report::build_report(&ranking, &badges);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

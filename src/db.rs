use anyhow::Context;
use chrono::{DateTime, Timelike, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{AttendanceLog, OccupancySnapshot, Person};
use crate::period;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let people = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "佐藤 太郎",
            "高3",
            "在塾",
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "鈴木 花子",
            "高2",
            "在塾",
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "田中 一郎",
            "既卒",
            "在塾",
        ),
    ];

    for (id, name, grade, status) in people {
        sqlx::query(
            r#"
            INSERT INTO studyroom.people (id, name, grade, status)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO UPDATE
            SET grade = EXCLUDED.grade, status = EXCLUDED.status
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(grade)
        .bind(status)
        .execute(pool)
        .await?;
    }

    let logs = vec![
        (
            "seed-001",
            "佐藤 太郎",
            "自習室A",
            "2026-08-10 09:00:00",
            Some("2026-08-10 12:30:00"),
        ),
        (
            "seed-002",
            "佐藤 太郎",
            "自習室A",
            "2026-08-10 13:15:00",
            Some("2026-08-10 18:00:00"),
        ),
        (
            "seed-003",
            "鈴木 花子",
            "自習室B",
            "2026-08-10 16:00:00",
            Some("2026-08-10 21:45:00"),
        ),
        (
            "seed-004",
            "田中 一郎",
            "自習室A",
            "2026-08-11 07:30:00",
            Some("2026-08-11 11:00:00"),
        ),
        // Open session: the duration engine infers the exit.
        ("seed-005", "鈴木 花子", "自習室B", "2026-08-11 19:00:00", None),
    ];

    for (source_key, name, place, entry, exit) in logs {
        let entry_time =
            period::parse_timestamp(entry).context("invalid seed entry_time")?;
        let exit_time = match exit {
            Some(raw) => Some(period::parse_timestamp(raw).context("invalid seed exit_time")?),
            None => None,
        };

        sqlx::query(
            r#"
            INSERT INTO studyroom.attendance_logs
            (id, person_name, place, entry_time, exit_time, source_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(place)
        .bind(entry_time)
        .bind(exit_time)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    let snapshots = vec![
        ("2026-08-10 10:00:00", 8, 3),
        ("2026-08-10 14:30:00", 15, 6),
        ("2026-08-10 20:15:00", 22, 9),
        ("2026-08-11 09:45:00", 5, 2),
    ];

    for (recorded, building1, building2) in snapshots {
        let recorded_at =
            period::parse_timestamp(recorded).context("invalid seed snapshot time")?;

        sqlx::query(
            r#"
            INSERT INTO studyroom.occupancy_snapshots
            (id, recorded_at, building1, building2, total)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (recorded_at) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(recorded_at)
        .bind(building1)
        .bind(building2)
        .bind(building1 + building2)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn fetch_people(pool: &PgPool) -> anyhow::Result<Vec<Person>> {
    let rows = sqlx::query("SELECT id, name, grade, status FROM studyroom.people ORDER BY name")
        .fetch_all(pool)
        .await?;

    let mut people = Vec::new();
    for row in rows {
        people.push(Person {
            id: row.get::<Uuid, _>("id").to_string(),
            name: row.get("name"),
            grade: row.get("grade"),
            status: row.get("status"),
        });
    }

    Ok(people)
}

pub async fn fetch_logs(pool: &PgPool) -> anyhow::Result<Vec<AttendanceLog>> {
    let rows = sqlx::query(
        "SELECT person_name, place, entry_time, exit_time \
         FROM studyroom.attendance_logs ORDER BY entry_time",
    )
    .fetch_all(pool)
    .await?;

    let mut logs = Vec::new();
    for row in rows {
        let entry_time: DateTime<Utc> = row.get("entry_time");
        let exit_time: Option<DateTime<Utc>> = row.get("exit_time");
        logs.push(AttendanceLog {
            name: row.get("person_name"),
            place: row.get("place"),
            entry_time: entry_time.to_rfc3339(),
            exit_time: exit_time.map(|t| t.to_rfc3339()),
        });
    }

    Ok(logs)
}

pub async fn fetch_snapshots(pool: &PgPool) -> anyhow::Result<Vec<OccupancySnapshot>> {
    let rows = sqlx::query(
        "SELECT recorded_at, building1, building2, total \
         FROM studyroom.occupancy_snapshots ORDER BY recorded_at",
    )
    .fetch_all(pool)
    .await?;

    let mut snapshots = Vec::new();
    for row in rows {
        let recorded_at: DateTime<Utc> = row.get("recorded_at");
        let local = period::to_jst(recorded_at);
        snapshots.push(OccupancySnapshot {
            timestamp: recorded_at.to_rfc3339(),
            date: local.format("%Y-%m-%d").to_string(),
            day: local.format("%a").to_string(),
            hour: local.hour(),
            minute: local.minute(),
            building1: row.get::<i32, _>("building1") as i64,
            building2: row.get::<i32, _>("building2") as i64,
            total: row.get::<i32, _>("total") as i64,
        });
    }

    Ok(snapshots)
}

pub async fn import_people_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        name: String,
        grade: String,
        status: String,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut upserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        sqlx::query(
            r#"
            INSERT INTO studyroom.people (id, name, grade, status)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO UPDATE
            SET grade = EXCLUDED.grade, status = EXCLUDED.status
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.name)
        .bind(&row.grade)
        .bind(&row.status)
        .execute(pool)
        .await?;
        upserted += 1;
    }

    Ok(upserted)
}

pub async fn import_logs_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        name: String,
        place: String,
        entry_time: String,
        exit_time: Option<String>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let entry_time = period::parse_timestamp(&row.entry_time)
            .with_context(|| format!("unparseable entry_time: {}", row.entry_time))?;
        let exit_time = row
            .exit_time
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .and_then(period::parse_timestamp);

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO studyroom.attendance_logs
            (id, person_name, place, entry_time, exit_time, source_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.name)
        .bind(&row.place)
        .bind(entry_time)
        .bind(exit_time)
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

pub async fn import_snapshots_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        timestamp: String,
        building1: i32,
        building2: i32,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let recorded_at = period::parse_timestamp(&row.timestamp)
            .with_context(|| format!("unparseable timestamp: {}", row.timestamp))?;

        let result = sqlx::query(
            r#"
            INSERT INTO studyroom.occupancy_snapshots
            (id, recorded_at, building1, building2, total)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (recorded_at) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(recorded_at)
        .bind(row.building1)
        .bind(row.building2)
        .bind(row.building1 + row.building2)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

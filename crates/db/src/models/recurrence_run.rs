use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

/// Audit record of one recurrence sweep.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RecurrenceRun {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub scanned: i64,
    pub created: i64,
    pub errors: i64,
}

impl RecurrenceRun {
    pub async fn record(
        pool: &SqlitePool,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        scanned: i64,
        created: i64,
        errors: i64,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as(
            r#"INSERT INTO recurrence_runs (id, started_at, finished_at, scanned, created, errors)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id, started_at, finished_at, scanned, created, errors"#,
        )
        .bind(id)
        .bind(started_at)
        .bind(finished_at)
        .bind(scanned)
        .bind(created)
        .bind(errors)
        .fetch_one(pool)
        .await
    }

    pub async fn find_latest(pool: &SqlitePool) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"SELECT id, started_at, finished_at, scanned, created, errors
               FROM recurrence_runs
               ORDER BY finished_at DESC
               LIMIT 1"#,
        )
        .fetch_optional(pool)
        .await
    }
}

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Type, Serialize, Deserialize, PartialEq, EnumString, Display, Default)]
#[sqlx(type_name = "task_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Todo,
    Doing,
    Done,
    Canceled,
}

#[derive(Debug, Clone, Type, Serialize, Deserialize, PartialEq, EnumString, Display, Default)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// Recognized recurrence cadences. Tasks store the rule as free text so rows
/// written by older clients survive; anything that does not parse into one of
/// these variants leaves due dates untouched when the task recurs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RecurrenceRule {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RecurrenceRule {
    /// Step `from` forward by `interval` units of this cadence.
    ///
    /// Monthly and yearly steps clamp to the last valid day of the target
    /// month (Jan 31 + 1 month = Feb 28/29). Out-of-range results leave the
    /// input unchanged rather than failing.
    pub fn advance(&self, from: DateTime<Utc>, interval: u32) -> DateTime<Utc> {
        match self {
            RecurrenceRule::Daily => from
                .checked_add_signed(Duration::days(i64::from(interval)))
                .unwrap_or(from),
            RecurrenceRule::Weekly => from
                .checked_add_signed(Duration::weeks(i64::from(interval)))
                .unwrap_or(from),
            RecurrenceRule::Monthly => from
                .checked_add_months(Months::new(interval))
                .unwrap_or(from),
            RecurrenceRule::Yearly => from
                .checked_add_months(Months::new(interval.saturating_mul(12)))
                .unwrap_or(from),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub list_id: Uuid,  // Foreign key to List
    pub owner_id: Uuid, // Foreign key to User
    pub title: String,
    pub notes: Option<String>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub due_at: Option<DateTime<Utc>>,
    pub recurrence_rule: Option<String>, // Free-text cadence, see RecurrenceRule
    pub recurrence_interval: Option<i64>,
    pub next_due_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    pub list_id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub notes: Option<String>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub due_at: Option<DateTime<Utc>>,
    pub recurrence_rule: Option<String>,
    pub recurrence_interval: Option<i64>,
    pub next_due_at: Option<DateTime<Utc>>,
}

impl CreateTask {
    /// Build the follow-up occurrence of a completed recurring task: same
    /// list, owner, title, notes and priority, back in `todo`, carrying the
    /// recurrence settings forward to the advanced due dates.
    pub fn next_occurrence_of(
        source: &Task,
        due_at: DateTime<Utc>,
        next_due_at: DateTime<Utc>,
    ) -> Self {
        Self {
            list_id: source.list_id,
            owner_id: source.owner_id,
            title: source.title.clone(),
            notes: source.notes.clone(),
            priority: source.priority.clone(),
            status: TaskStatus::Todo,
            due_at: Some(due_at),
            recurrence_rule: source.recurrence_rule.clone(),
            recurrence_interval: source.recurrence_interval,
            next_due_at: Some(next_due_at),
        }
    }
}

impl Task {
    /// Repeat interval with malformed values (NULL, zero, negative) mapped to 1.
    pub fn effective_interval(&self) -> u32 {
        self.recurrence_interval
            .and_then(|interval| u32::try_from(interval).ok())
            .filter(|interval| *interval > 0)
            .unwrap_or(1)
    }

    /// Completed tasks that still carry an active recurrence: the set the
    /// recurrence sweep turns into fresh occurrences.
    pub async fn find_completed_recurring(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"SELECT id, list_id, owner_id, title, notes, priority, status, due_at,
                      recurrence_rule, recurrence_interval, next_due_at, created_at, updated_at
               FROM tasks
               WHERE status = 'done'
                 AND recurrence_rule IS NOT NULL
                 AND next_due_at IS NOT NULL
               ORDER BY created_at ASC"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"SELECT id, list_id, owner_id, title, notes, priority, status, due_at,
                      recurrence_rule, recurrence_interval, next_due_at, created_at, updated_at
               FROM tasks
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create<'e, E>(
        executor: E,
        data: &CreateTask,
        task_id: Uuid,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as(
            r#"INSERT INTO tasks (id, list_id, owner_id, title, notes, priority, status, due_at,
                                  recurrence_rule, recurrence_interval, next_due_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
               RETURNING id, list_id, owner_id, title, notes, priority, status, due_at,
                         recurrence_rule, recurrence_interval, next_due_at, created_at, updated_at"#,
        )
        .bind(task_id)
        .bind(data.list_id)
        .bind(data.owner_id)
        .bind(&data.title)
        .bind(&data.notes)
        .bind(&data.priority)
        .bind(&data.status)
        .bind(data.due_at)
        .bind(&data.recurrence_rule)
        .bind(data.recurrence_interval)
        .bind(data.next_due_at)
        .fetch_one(executor)
        .await
    }

    /// Detach a task from its recurrence so a completed occurrence spawns at
    /// most one follow-up. Returns the number of rows touched.
    pub async fn clear_recurrence<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"UPDATE tasks
               SET recurrence_rule = NULL,
                   next_due_at = NULL,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1"#,
        )
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}

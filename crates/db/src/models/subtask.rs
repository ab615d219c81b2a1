use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

/// Checklist item belonging to a task.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Subtask {
    pub id: Uuid,
    pub task_id: Uuid, // Foreign key to Task
    pub title: String,
    pub completed: bool,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubtask {
    pub title: String,
    pub completed: bool,
    pub position: i64,
}

impl CreateSubtask {
    /// Copy of an existing subtask at the same position, unticked.
    pub fn clone_of(source: &Subtask) -> Self {
        Self {
            title: source.title.clone(),
            completed: false,
            position: source.position,
        }
    }
}

impl Subtask {
    pub async fn find_by_task_id(
        pool: &SqlitePool,
        task_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"SELECT id, task_id, title, completed, position, created_at, updated_at
               FROM subtasks
               WHERE task_id = $1
               ORDER BY position ASC, created_at ASC"#,
        )
        .bind(task_id)
        .fetch_all(pool)
        .await
    }

    /// Insert a batch of subtasks under `task_id` in one statement.
    pub async fn create_many<'e, E>(
        executor: E,
        task_id: Uuid,
        data: &[CreateSubtask],
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        if data.is_empty() {
            return Ok(0);
        }

        let mut query_builder =
            QueryBuilder::new("INSERT INTO subtasks (id, task_id, title, completed, position) ");
        query_builder.push_values(data, |mut row, subtask| {
            row.push_bind(Uuid::new_v4())
                .push_bind(task_id)
                .push_bind(&subtask.title)
                .push_bind(subtask.completed)
                .push_bind(subtask.position);
        });

        let result = query_builder.build().execute(executor).await?;
        Ok(result.rows_affected())
    }
}

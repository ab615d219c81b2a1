//! Service for rolling completed recurring tasks into their next occurrence.

use chrono::{DateTime, Utc};
use db::{
    DBService,
    models::{
        recurrence_run::RecurrenceRun,
        subtask::{CreateSubtask, Subtask},
        task::{CreateTask, RecurrenceRule, Task},
    },
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RecurrenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Counters for one sweep over the completed recurring tasks.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecurrenceRunSummary {
    pub scanned: u64,
    pub created: u64,
    pub errors: u64,
}

impl RecurrenceRunSummary {
    pub fn summary(&self) -> String {
        format!(
            "scanned {} completed recurring tasks, created {} new occurrences, {} errors",
            self.scanned, self.created, self.errors
        )
    }
}

/// Advance `from` by `interval` units of the free-text `rule`.
///
/// A rule that does not parse into a [`RecurrenceRule`] leaves the date
/// unchanged, so a task with a bad rule repeats in place instead of failing
/// the sweep.
pub fn advance(from: DateTime<Utc>, rule: &str, interval: u32) -> DateTime<Utc> {
    match rule.parse::<RecurrenceRule>() {
        Ok(rule) => rule.advance(from, interval),
        Err(_) => from,
    }
}

/// The due date the next occurrence is computed from. Eligible tasks always
/// have `next_due_at` set; the fallbacks keep the computation total for rows
/// older clients wrote without one.
fn current_due(task: &Task, now: DateTime<Utc>) -> DateTime<Utc> {
    task.next_due_at.or(task.due_at).unwrap_or(now)
}

/// Batch service that turns completed recurring tasks into fresh `todo`
/// occurrences. One shot per invocation; scheduling is the caller's job.
pub struct RecurrenceService {
    db: DBService,
}

impl RecurrenceService {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }

    /// Sweep all completed tasks with an active recurrence and spawn their
    /// next occurrence. Failures on individual tasks are counted and logged;
    /// the failed task keeps its recurrence so the next sweep retries it.
    /// Only a failure of the initial scan aborts the run.
    pub async fn run(&self) -> Result<RecurrenceRunSummary, RecurrenceError> {
        let started_at = Utc::now();
        let tasks = Task::find_completed_recurring(&self.db.pool).await?;

        if tasks.is_empty() {
            debug!("Recurrence: no completed recurring tasks");
        } else {
            info!(
                eligible = tasks.len(),
                "Recurrence: processing completed recurring tasks"
            );
        }

        let mut summary = RecurrenceRunSummary::default();
        for task in &tasks {
            summary.scanned += 1;
            match self.spawn_next_occurrence(task).await {
                Ok(created) => {
                    summary.created += 1;
                    info!(
                        task_id = %task.id,
                        new_task_id = %created.id,
                        due_at = ?created.due_at,
                        "Recurrence: created next occurrence"
                    );
                }
                Err(e) => {
                    summary.errors += 1;
                    warn!(
                        task_id = %task.id,
                        error = %e,
                        "Recurrence: failed to roll task forward, left for next run"
                    );
                }
            }
        }

        let finished_at = Utc::now();
        if let Err(e) = RecurrenceRun::record(
            &self.db.pool,
            started_at,
            finished_at,
            summary.scanned as i64,
            summary.created as i64,
            summary.errors as i64,
        )
        .await
        {
            warn!(error = %e, "Recurrence: failed to record run");
        }

        Ok(summary)
    }

    /// Create the follow-up occurrence for one completed task and detach the
    /// source from its recurrence, atomically. The new task copies title,
    /// notes, priority, list and owner, inherits the recurrence settings, and
    /// gets an unticked copy of every subtask in the same order.
    async fn spawn_next_occurrence(&self, source: &Task) -> Result<Task, RecurrenceError> {
        let subtasks = Subtask::find_by_task_id(&self.db.pool, source.id).await?;

        let rule = source.recurrence_rule.as_deref().unwrap_or_default();
        let interval = source.effective_interval();
        let anchor = current_due(source, Utc::now());
        let (due_at, next_due_at) = match rule.parse::<RecurrenceRule>() {
            Ok(cadence) => {
                let due = cadence.advance(anchor, interval);
                let next = cadence.advance(due, interval);
                (due, next)
            }
            Err(_) => {
                warn!(
                    task_id = %source.id,
                    rule = %rule,
                    "Recurrence: unrecognized rule, due dates carried over unchanged"
                );
                (anchor, anchor)
            }
        };

        let clones: Vec<CreateSubtask> = subtasks.iter().map(CreateSubtask::clone_of).collect();

        let mut tx = self.db.pool.begin().await?;
        let created = Task::create(
            &mut *tx,
            &CreateTask::next_occurrence_of(source, due_at, next_due_at),
            Uuid::new_v4(),
        )
        .await?;
        Subtask::create_many(&mut *tx, created.id, &clones).await?;
        Task::clear_recurrence(&mut *tx, source.id).await?;
        tx.commit().await?;

        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use db::models::task::{TaskPriority, TaskStatus};

    use super::*;

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 8, 0, 0).unwrap()
    }

    fn done_task(
        due_at: Option<DateTime<Utc>>,
        next_due_at: Option<DateTime<Utc>>,
    ) -> Task {
        Task {
            id: Uuid::new_v4(),
            list_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: "Take out recycling".to_string(),
            notes: None,
            priority: TaskPriority::Medium,
            status: TaskStatus::Done,
            due_at,
            recurrence_rule: Some("weekly".to_string()),
            recurrence_interval: Some(1),
            next_due_at,
            created_at: at(2024, 1, 1),
            updated_at: at(2024, 1, 1),
        }
    }

    #[test]
    fn advance_dispatches_on_the_rule_token() {
        let from = at(2024, 1, 10);
        assert_eq!(advance(from, "daily", 1), at(2024, 1, 11));
        assert_eq!(advance(from, "weekly", 1), at(2024, 1, 17));
        assert_eq!(advance(from, "monthly", 1), at(2024, 2, 10));
        assert_eq!(advance(from, "yearly", 1), at(2025, 1, 10));
    }

    #[test]
    fn advance_with_unknown_rule_returns_the_input() {
        let from = at(2024, 1, 10);
        assert_eq!(advance(from, "fortnightly", 1), from);
        assert_eq!(advance(from, "DAILY", 1), from);
        assert_eq!(advance(from, "", 3), from);
    }

    #[test]
    fn current_due_prefers_next_due_at() {
        let task = done_task(Some(at(2024, 1, 5)), Some(at(2024, 1, 10)));
        assert_eq!(current_due(&task, at(2024, 2, 1)), at(2024, 1, 10));
    }

    #[test]
    fn current_due_falls_back_to_due_at_then_now() {
        let now = at(2024, 2, 1);
        let task = done_task(Some(at(2024, 1, 5)), None);
        assert_eq!(current_due(&task, now), at(2024, 1, 5));

        let task = done_task(None, None);
        assert_eq!(current_due(&task, now), now);
    }

    #[test]
    fn summary_reports_all_counters() {
        let summary = RecurrenceRunSummary {
            scanned: 3,
            created: 2,
            errors: 1,
        };
        assert_eq!(
            summary.summary(),
            "scanned 3 completed recurring tasks, created 2 new occurrences, 1 errors"
        );
    }
}

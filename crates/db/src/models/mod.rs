pub mod recurrence_run;
pub mod subtask;
pub mod task;

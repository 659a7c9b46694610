use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use lotline_common::SortStrategy;

/// Backfill task lifecycle: `Pending → Running → {Succeeded, Failed}`,
/// with `Running → Pending` on a transient collector failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Succeeded => write!(f, "succeeded"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One scheduled re-collection unit for a (subreddit, window, sort) cell.
#[derive(Debug, Clone, Serialize)]
pub struct BackfillTask {
    pub id: Uuid,
    pub subreddit: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub sort: SortStrategy,
    /// Gap ratio of the bucket that spawned this task; higher runs first.
    pub priority: f64,
    pub attempt: u32,
    pub status: TaskStatus,
    pub last_error: Option<String>,
}

impl BackfillTask {
    /// Identity used to suppress duplicate scheduling of the same cell.
    pub fn cell(&self) -> (&str, DateTime<Utc>, SortStrategy) {
        (&self.subreddit, self.window_start, self.sort)
    }
}

// ABOUTME: Serializable snapshots of task instances and aggregated run status
// ABOUTME: Summarises a scheduler's root tasks and their descendants

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::instance::{TaskId, TaskInstance, TaskStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub parent: Option<TaskId>,
    /// Nesting level; root tasks are at depth 0.
    pub depth: usize,
    pub name: String,
    pub title: String,
    pub status: TaskStatus,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration: Option<Duration>,
}

impl TaskSnapshot {
    pub fn from_instance(instance: &TaskInstance, depth: usize) -> Self {
        let state = instance.state();
        Self {
            id: instance.id(),
            parent: instance.parent(),
            depth,
            name: instance.name().to_string(),
            title: instance.title().to_string(),
            status: state.status,
            duration: state.duration(),
            error: state.error,
            started_at: state.started_at,
            finished_at: state.finished_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub cancelled: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub status: RunStatus,
    pub tasks: Vec<TaskSnapshot>,
    /// Counts over root tasks only.
    pub roots: StatusCounts,
}

impl RunSummary {
    pub fn new(tasks: Vec<TaskSnapshot>) -> Self {
        let mut roots = StatusCounts::default();
        for task in tasks.iter().filter(|t| t.depth == 0) {
            roots.total += 1;
            match task.status {
                TaskStatus::Pending => roots.pending += 1,
                TaskStatus::Running => roots.running += 1,
                TaskStatus::Succeeded => roots.succeeded += 1,
                TaskStatus::Failed => roots.failed += 1,
                TaskStatus::TimedOut => roots.timed_out += 1,
                TaskStatus::Cancelled => roots.cancelled += 1,
            }
        }

        let status = if roots.running > 0 {
            RunStatus::Running
        } else if roots.failed > 0 || roots.timed_out > 0 {
            RunStatus::Failed
        } else if roots.cancelled > 0 {
            RunStatus::Cancelled
        } else if roots.succeeded == roots.total {
            RunStatus::Succeeded
        } else {
            RunStatus::Pending
        };

        Self {
            status,
            tasks,
            roots,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn success_rate(&self) -> f64 {
        if self.roots.total == 0 {
            0.0
        } else {
            (self.roots.succeeded as f64 / self.roots.total as f64) * 100.0
        }
    }

    pub fn get_task(&self, id: TaskId) -> Option<&TaskSnapshot> {
        self.tasks.iter().find(|t| t.id == id)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Succeeded => write!(f, "succeeded"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ABOUTME: Error types for task registration, scheduling and execution
// ABOUTME: Distinguishes configuration mistakes from timeouts, cancellation and task failures

use std::time::Duration;
use thiserror::Error;

use super::instance::{TaskId, TaskStatus};

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Unknown task type: {name}")]
    UnknownTaskType { name: String },

    #[error("Task type already registered: {name}")]
    DuplicateTaskType { name: String },

    #[error("Invalid configuration for task '{name}': {message}")]
    ConfigError { name: String, message: String },

    #[error("Task {task_id} ({name}) timed out after {elapsed:?} (timeout: {timeout:?})")]
    Timeout {
        task_id: TaskId,
        name: String,
        elapsed: Duration,
        timeout: Duration,
    },

    #[error("Task {task_id} ({name}) cancelled")]
    Cancelled { task_id: TaskId, name: String },

    #[error("Task {task_id} ({name}) failed: {source:#}")]
    TaskFailed {
        task_id: TaskId,
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Start index {index} out of range for {len} root tasks")]
    InvalidIndex { index: usize, len: usize },

    #[error("Task {task_id}: invalid status transition {from} -> {to}")]
    InvalidTransition {
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Task not found: {task_id}")]
    TaskNotFound { task_id: TaskId },
}

impl ExecutionError {
    /// Id of the task this error belongs to, if any.
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            ExecutionError::Timeout { task_id, .. }
            | ExecutionError::Cancelled { task_id, .. }
            | ExecutionError::TaskFailed { task_id, .. }
            | ExecutionError::InvalidTransition { task_id, .. }
            | ExecutionError::TaskNotFound { task_id } => Some(*task_id),
            _ => None,
        }
    }

    /// Configuration and registration errors need a fix before anything is re-run.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExecutionError::Timeout { .. }
                | ExecutionError::TaskFailed { .. }
                | ExecutionError::Cancelled { .. }
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExecutionError::Cancelled { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecutionError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, ExecutionError>;

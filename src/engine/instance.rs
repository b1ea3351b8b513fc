// ABOUTME: Task instances, their scheduling options and the status state machine
// ABOUTME: Instances live in the scheduler arena and are addressed by TaskId

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::error::{ExecutionError, Result};
use crate::tasks::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scheduling input for a single task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOptions {
    /// Registered task type name.
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    /// `None` or zero means the task is only bounded by its parent context.
    #[serde(with = "humantime_serde", default)]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub config: serde_yaml::Value,
}

impl TaskOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            timeout: None,
            config: serde_yaml::Value::Null,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_config(mut self, config: serde_yaml::Value) -> Self {
        self.config = config;
        self
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    /// Effective deadline duration, ignoring a zero timeout.
    pub fn effective_timeout(&self) -> Option<Duration> {
        self.timeout.filter(|t| !t.is_zero())
    }
}

/// Serialize a typed task configuration into the raw form accepted by [`TaskOptions`].
pub fn raw_config<C: Serialize>(config: &C) -> std::result::Result<serde_yaml::Value, serde_yaml::Error> {
    serde_yaml::to_value(config)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Pending | TaskStatus::Running)
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        match (self, next) {
            (TaskStatus::Pending, TaskStatus::Running) => true,
            (TaskStatus::Running, next) => next.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Succeeded => write!(f, "succeeded"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::TimedOut => write!(f, "timed_out"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    pub status: TaskStatus,
    /// Set iff the status is `Failed` or `TimedOut`.
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskState {
    pub fn new() -> Self {
        Self {
            status: TaskStatus::Pending,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn duration(&self) -> Option<Duration> {
        let started = self.started_at?;
        let finished = self.finished_at?;
        (finished - started).to_std().ok()
    }
}

impl Default for TaskState {
    fn default() -> Self {
        Self::new()
    }
}

/// One scheduled unit of work.
///
/// Options and the resolved task are immutable after creation; only the
/// [`TaskState`] changes, and only along the forward transitions of
/// [`TaskStatus::can_transition_to`].
pub struct TaskInstance {
    id: TaskId,
    parent: Option<TaskId>,
    options: TaskOptions,
    task: Box<dyn Task>,
    children: Vec<TaskId>,
    state: RwLock<TaskState>,
}

impl TaskInstance {
    pub(crate) fn new(
        id: TaskId,
        parent: Option<TaskId>,
        options: TaskOptions,
        task: Box<dyn Task>,
        children: Vec<TaskId>,
    ) -> Self {
        Self {
            id,
            parent,
            options,
            task,
            children,
            state: RwLock::new(TaskState::new()),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn parent(&self) -> Option<TaskId> {
        self.parent
    }

    pub fn options(&self) -> &TaskOptions {
        &self.options
    }

    pub fn name(&self) -> &str {
        &self.options.name
    }

    pub fn title(&self) -> &str {
        self.options.title()
    }

    pub fn children(&self) -> &[TaskId] {
        &self.children
    }

    pub fn task(&self) -> &dyn Task {
        self.task.as_ref()
    }

    pub fn state(&self) -> TaskState {
        self.state.read().clone()
    }

    pub fn status(&self) -> TaskStatus {
        self.state.read().status
    }

    pub(crate) fn mark_started(&self) -> Result<DateTime<Utc>> {
        let mut state = self.state.write();
        self.check_transition(state.status, TaskStatus::Running)?;
        let now = Utc::now();
        state.status = TaskStatus::Running;
        state.started_at = Some(now);
        Ok(now)
    }

    pub(crate) fn mark_finished(&self, status: TaskStatus, error: Option<String>) -> Result<()> {
        let mut state = self.state.write();
        self.check_transition(state.status, status)?;
        state.status = status;
        state.finished_at = Some(Utc::now());
        state.error = match status {
            TaskStatus::Failed | TaskStatus::TimedOut => error,
            _ => None,
        };
        Ok(())
    }

    fn check_transition(&self, from: TaskStatus, to: TaskStatus) -> Result<()> {
        if from.can_transition_to(to) {
            Ok(())
        } else {
            Err(ExecutionError::InvalidTransition {
                task_id: self.id,
                from,
                to,
            })
        }
    }
}

impl fmt::Debug for TaskInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskInstance")
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("name", &self.options.name)
            .field("children", &self.children)
            .field("state", &*self.state.read())
            .finish()
    }
}

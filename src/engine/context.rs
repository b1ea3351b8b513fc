// ABOUTME: Task-scoped execution context handed to running tasks
// ABOUTME: Combines parent cancellation with the task deadline and runs composite children

use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use super::error::{ExecutionError, Result};
use super::instance::TaskId;
use super::scheduler::ExecutionCore;
use crate::vars::Variables;

/// Runtime view of one executing task.
///
/// The context is cancelled when its parent context is cancelled or when the
/// task deadline elapses, whichever comes first.
pub struct TaskContext {
    task_id: TaskId,
    name: String,
    title: String,
    timeout: Option<Duration>,
    started: Instant,
    deadline: Option<Instant>,
    parent_token: CancellationToken,
    token: CancellationToken,
    children: Vec<TaskId>,
    core: Arc<ExecutionCore>,
}

impl TaskContext {
    pub(crate) fn new(
        task_id: TaskId,
        name: String,
        title: String,
        timeout: Option<Duration>,
        parent_token: &CancellationToken,
        children: Vec<TaskId>,
        core: Arc<ExecutionCore>,
    ) -> Self {
        let started = Instant::now();
        Self {
            task_id,
            name,
            title,
            timeout,
            started,
            deadline: timeout.map(|t| started + t),
            parent_token: parent_token.clone(),
            token: parent_token.child_token(),
            children,
            core,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Ids of the child instances declared by a composite task, in order.
    pub fn children(&self) -> &[TaskId] {
        &self.children
    }

    /// Token for sub-work spawned by the task. It is cancelled at the latest
    /// when the task finishes.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline_elapsed()
    }

    pub fn is_parent_cancelled(&self) -> bool {
        self.parent_token.is_cancelled()
    }

    pub fn deadline_elapsed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves once the context is cancelled.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Error describing why the context stopped: a timeout when the task's
    /// own deadline elapsed, cancellation otherwise.
    pub fn interruption_error(&self) -> ExecutionError {
        match self.timeout {
            Some(timeout) if !self.parent_token.is_cancelled() && self.deadline_elapsed() => {
                ExecutionError::Timeout {
                    task_id: self.task_id,
                    name: self.name.clone(),
                    elapsed: self.elapsed(),
                    timeout,
                }
            }
            _ => ExecutionError::Cancelled {
                task_id: self.task_id,
                name: self.name.clone(),
            },
        }
    }

    /// Sleep for `duration`, returning the interruption error if the context
    /// is cancelled first.
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(self.interruption_error()),
            _ = sleep(duration) => Ok(()),
        }
    }

    /// Execute one of this task's children under this context.
    pub fn run_child<'a>(&'a self, child: TaskId, scope: &'a Variables) -> BoxFuture<'a, Result<()>> {
        self.run_child_in(child, &self.token, scope)
    }

    /// Execute a child under `parent`, which must be derived from [`Self::token`].
    pub fn run_child_in<'a>(
        &'a self,
        child: TaskId,
        parent: &'a CancellationToken,
        scope: &'a Variables,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            if !self.children.contains(&child) {
                return Err(ExecutionError::TaskNotFound { task_id: child });
            }
            if self.is_cancelled() || parent.is_cancelled() {
                return Err(self.interruption_error());
            }
            self.core.execute(child, parent, scope).await
        }
        .boxed()
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("task_id", &self.task_id)
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

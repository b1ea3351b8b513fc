// ABOUTME: Composite task running its child tasks concurrently in isolated scopes
// ABOUTME: Cancels the remaining children on the first failure and waits for all to settle

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Task, TaskConfig, TaskDescriptor};
use crate::engine::{TaskContext, TaskOptions};
use crate::services::ServicesProvider;
use crate::vars::Variables;

pub const TASK_NAME: &str = "run_tasks_concurrent";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunTasksConcurrentConfig {
    pub tasks: Vec<TaskOptions>,
}

impl TaskConfig for RunTasksConcurrentConfig {
    fn validate(&self) -> Result<(), String> {
        if self.tasks.is_empty() {
            return Err("at least one child task is required".to_string());
        }
        Ok(())
    }
}

pub struct RunTasksConcurrentTask {
    config: RunTasksConcurrentConfig,
}

pub fn descriptor() -> TaskDescriptor {
    TaskDescriptor::new(
        TASK_NAME,
        "Run child tasks concurrently",
        |config: RunTasksConcurrentConfig| RunTasksConcurrentTask { config },
    )
}

#[async_trait]
impl Task for RunTasksConcurrentTask {
    async fn execute(
        &self,
        ctx: &TaskContext,
        _services: &ServicesProvider,
        vars: &Variables,
    ) -> anyhow::Result<()> {
        let group = ctx.token().child_token();
        let group = &group;

        // Every child gets its own scope from the scheduler, so siblings only
        // see each other's outputs once merged into `vars` on success.
        let runs = ctx.children().iter().map(|child| async move {
            let result = ctx.run_child_in(*child, group, vars).await;
            if let Err(e) = &result {
                if !group.is_cancelled() {
                    warn!("Child task {} failed, cancelling siblings: {}", child, e);
                    group.cancel();
                }
            }
            result
        });
        let results = join_all(runs).await;
        debug!("All {} concurrent children settled", results.len());

        // Report the failure that triggered the cancellation rather than the
        // cancellations it caused.
        let mut first_error = None;
        for err in results.into_iter().filter_map(|r| r.err()) {
            if !err.is_cancelled() {
                return Err(err.into());
            }
            first_error.get_or_insert(err);
        }
        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    fn child_tasks(&self) -> &[TaskOptions] {
        &self.config.tasks
    }
}

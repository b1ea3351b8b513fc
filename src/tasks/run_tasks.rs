// ABOUTME: Composite task running its child tasks one after another
// ABOUTME: Fails fast by default, optionally continues and reports all failures at the end

use anyhow::bail;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{Task, TaskConfig, TaskDescriptor};
use crate::engine::{TaskContext, TaskOptions};
use crate::services::ServicesProvider;
use crate::vars::Variables;

pub const TASK_NAME: &str = "run_tasks";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunTasksConfig {
    pub tasks: Vec<TaskOptions>,
    #[serde(default)]
    pub continue_on_failure: bool,
}

impl TaskConfig for RunTasksConfig {
    fn validate(&self) -> Result<(), String> {
        if self.tasks.is_empty() {
            return Err("at least one child task is required".to_string());
        }
        Ok(())
    }
}

pub struct RunTasksTask {
    config: RunTasksConfig,
}

pub fn descriptor() -> TaskDescriptor {
    TaskDescriptor::new(
        TASK_NAME,
        "Run child tasks sequentially",
        |config: RunTasksConfig| RunTasksTask { config },
    )
}

#[async_trait]
impl Task for RunTasksTask {
    async fn execute(
        &self,
        ctx: &TaskContext,
        _services: &ServicesProvider,
        vars: &Variables,
    ) -> anyhow::Result<()> {
        let total = ctx.children().len();
        let mut failures = Vec::new();

        for (index, child) in ctx.children().iter().enumerate() {
            info!("Running child {}/{} (task {})", index + 1, total, child);
            match ctx.run_child(*child, vars).await {
                Ok(()) => {}
                Err(e) if self.config.continue_on_failure && !ctx.is_cancelled() => {
                    warn!("Child task {} failed, continuing: {}", child, e);
                    failures.push(e.to_string());
                }
                Err(e) => return Err(e.into()),
            }
        }

        if !failures.is_empty() {
            bail!(
                "{} of {} child tasks failed: {}",
                failures.len(),
                total,
                failures.join("; ")
            );
        }
        Ok(())
    }

    fn child_tasks(&self) -> &[TaskOptions] {
        &self.config.tasks
    }
}

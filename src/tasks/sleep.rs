// ABOUTME: Sleep task that waits for a fixed duration
// ABOUTME: Returns early with the interruption error when its context is cancelled

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use super::{Task, TaskConfig, TaskDescriptor};
use crate::engine::TaskContext;
use crate::services::ServicesProvider;
use crate::vars::Variables;

pub const TASK_NAME: &str = "sleep";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SleepConfig {
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

impl TaskConfig for SleepConfig {}

pub struct SleepTask {
    config: SleepConfig,
}

pub fn descriptor() -> TaskDescriptor {
    TaskDescriptor::new(TASK_NAME, "Sleep for a fixed duration", |config: SleepConfig| {
        SleepTask { config }
    })
}

#[async_trait]
impl Task for SleepTask {
    async fn execute(
        &self,
        ctx: &TaskContext,
        _services: &ServicesProvider,
        _vars: &Variables,
    ) -> anyhow::Result<()> {
        info!("Sleeping for {:?}", self.config.duration);
        ctx.sleep(self.config.duration).await?;
        Ok(())
    }
}

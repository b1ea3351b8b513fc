// ABOUTME: Poll task waiting until the selected clients report healthy (or unhealthy)
// ABOUTME: Probes every selected client concurrently once per poll interval

use anyhow::anyhow;
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use super::{Task, TaskConfig, TaskDescriptor};
use crate::engine::{poll_until, TaskContext};
use crate::services::{ClientPool, ServicesProvider};
use crate::vars::Variables;

pub const TASK_NAME: &str = "check_clients_are_healthy";

/// Variable written on success: number of clients matching the expectation.
pub const OUTPUT_MATCHING_CLIENTS: &str = "healthy_clients";

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckClientsConfig {
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,
    /// Clients to check; empty selects every client in the pool.
    #[serde(default)]
    pub client_names: Vec<String>,
    /// Clients that must match; 0 means all selected clients.
    #[serde(default)]
    pub min_client_count: usize,
    /// Wait for clients to become unhealthy instead.
    #[serde(default)]
    pub expect_unhealthy: bool,
}

impl Default for CheckClientsConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            client_names: Vec::new(),
            min_client_count: 0,
            expect_unhealthy: false,
        }
    }
}

impl TaskConfig for CheckClientsConfig {
    fn validate(&self) -> Result<(), String> {
        if self.poll_interval.is_zero() {
            return Err("poll_interval must be greater than zero".to_string());
        }
        if !self.client_names.is_empty() && self.min_client_count > self.client_names.len() {
            return Err(format!(
                "min_client_count ({}) exceeds the number of selected clients ({})",
                self.min_client_count,
                self.client_names.len()
            ));
        }
        Ok(())
    }
}

pub struct CheckClientsTask {
    config: CheckClientsConfig,
}

pub fn descriptor() -> TaskDescriptor {
    TaskDescriptor::new(
        TASK_NAME,
        "Wait until the selected clients report the expected health",
        |config: CheckClientsConfig| CheckClientsTask { config },
    )
}

impl CheckClientsTask {
    /// One poll round. Errors mean "not met yet".
    async fn evaluate(&self, pool: &ClientPool, matching: &AtomicUsize) -> anyhow::Result<bool> {
        let clients = if self.config.client_names.is_empty() {
            pool.clients()
        } else {
            self.config
                .client_names
                .iter()
                .map(|name| {
                    pool.get_client(name)
                        .ok_or_else(|| anyhow!("client '{}' not found in pool", name))
                })
                .collect::<anyhow::Result<Vec<_>>>()?
        };
        if clients.is_empty() {
            return Err(anyhow!("no clients selected"));
        }

        let results = join_all(clients.iter().map(|client| pool.check_health(client))).await;

        let mut count = 0;
        for (client, result) in clients.iter().zip(results) {
            let healthy = match result {
                Ok(healthy) => healthy,
                Err(e) => {
                    debug!("Client {} probe failed: {}", client.name(), e);
                    false
                }
            };
            if healthy != self.config.expect_unhealthy {
                count += 1;
            }
        }
        matching.store(count, Ordering::SeqCst);

        let required = match self.config.min_client_count {
            0 => clients.len(),
            min => min,
        };
        debug!(
            "{}/{} clients {} (required: {})",
            count,
            clients.len(),
            if self.config.expect_unhealthy { "unhealthy" } else { "healthy" },
            required
        );
        Ok(count >= required)
    }
}

#[async_trait]
impl Task for CheckClientsTask {
    async fn execute(
        &self,
        ctx: &TaskContext,
        services: &ServicesProvider,
        vars: &Variables,
    ) -> anyhow::Result<()> {
        let pool = services.client_pool();
        let matching = AtomicUsize::new(0);
        let counter = &matching;

        poll_until(ctx, self.config.poll_interval, move || self.evaluate(pool, counter)).await?;

        let count = matching.load(Ordering::SeqCst);
        info!("Client check passed with {} matching client(s)", count);
        vars.set(OUTPUT_MATCHING_CLIENTS, count);
        Ok(())
    }
}

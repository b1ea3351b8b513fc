// ABOUTME: Test-only task types and service stubs for engine unit tests
// ABOUTME: Provides a registry builder with succeeding, failing, hanging and flaky tasks

use anyhow::bail;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::engine::TaskContext;
use crate::services::{
    Client, ClientConfig, ClientError, ClientPool, HealthProbe, ServicesProvider, ValidatorNames,
};
use crate::tasks::{Task, TaskConfig, TaskDescriptor, TaskRegistry};
use crate::vars::Variables;

pub(crate) struct StaticProbe(pub bool);

#[async_trait]
impl HealthProbe for StaticProbe {
    async fn check(&self, _client: &Client) -> Result<bool, ClientError> {
        Ok(self.0)
    }
}

pub(crate) fn services() -> ServicesProvider {
    services_with_clients(&[], Arc::new(StaticProbe(true)))
}

/// Services whose pool holds one consensus client per name.
pub(crate) fn services_with_clients(names: &[&str], probe: Arc<dyn HealthProbe>) -> ServicesProvider {
    let pool = ClientPool::with_probe(probe);
    for name in names {
        pool.add_client(ClientConfig {
            name: name.to_string(),
            consensus_url: Some(format!("http://{}.invalid:5052", name)),
            execution_url: None,
        })
        .expect("valid test client");
    }
    ServicesProvider::from_pool(Arc::new(pool), ValidatorNames::default())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct EmptyConfig {}

impl TaskConfig for EmptyConfig {}

enum Behavior {
    Succeed,
    Fail,
    Hang,
    Flaky { attempts: Arc<AtomicUsize>, failures: usize },
    Set { key: String, value: serde_json::Value },
}

struct TestTask {
    behavior: Arc<Behavior>,
}

#[async_trait]
impl Task for TestTask {
    async fn execute(
        &self,
        _ctx: &TaskContext,
        _services: &ServicesProvider,
        vars: &Variables,
    ) -> anyhow::Result<()> {
        match self.behavior.as_ref() {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => bail!("boom"),
            // Deliberately ignores its context
            Behavior::Hang => std::future::pending().await,
            Behavior::Flaky { attempts, failures } => {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                if attempt < *failures {
                    bail!("flaky failure on attempt {}", attempt + 1);
                }
                Ok(())
            }
            Behavior::Set { key, value } => {
                vars.set(key.clone(), value.clone());
                Ok(())
            }
        }
    }
}

/// Builtin registry extended with test task types.
pub(crate) struct TestRegistry {
    registry: TaskRegistry,
}

impl TestRegistry {
    pub(crate) fn new() -> Self {
        Self {
            registry: TaskRegistry::with_builtin_tasks(),
        }
        .with("succeed", Behavior::Succeed)
        .with("fail", Behavior::Fail)
        .with("hang", Behavior::Hang)
    }

    fn with(mut self, name: &str, behavior: Behavior) -> Self {
        let behavior = Arc::new(behavior);
        let descriptor = TaskDescriptor::new(name, "test task", move |_: EmptyConfig| TestTask {
            behavior: Arc::clone(&behavior),
        });
        self.registry
            .register(descriptor)
            .expect("test task names are unique");
        self
    }

    /// Fails the first `failures` attempts, then succeeds.
    pub(crate) fn flaky(self, name: &str, attempts: Arc<AtomicUsize>, failures: usize) -> Self {
        self.with(name, Behavior::Flaky { attempts, failures })
    }

    /// Writes `key = value` into its scope.
    pub(crate) fn setter(self, name: &str, key: &str, value: serde_json::Value) -> Self {
        self.with(
            name,
            Behavior::Set {
                key: key.to_string(),
                value,
            },
        )
    }

    pub(crate) fn build(self) -> TaskRegistry {
        self.registry
    }
}

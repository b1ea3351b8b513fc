// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Provides stub health probes, scripted test tasks and test plan files

#![allow(dead_code)]

use anyhow::bail;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use beaconflow::engine::TaskContext;
use beaconflow::services::{
    Client, ClientConfig, ClientError, ClientPool, HealthProbe, ServicesProvider, ValidatorNames,
};
use beaconflow::tasks::{Task, TaskConfig, TaskDescriptor, TaskRegistry};
use beaconflow::vars::Variables;
use beaconflow::TaskScheduler;

/// Probe answering every check with the same outcome.
pub struct StaticProbe(pub bool);

#[async_trait]
impl HealthProbe for StaticProbe {
    async fn check(&self, _client: &Client) -> Result<bool, ClientError> {
        Ok(self.0)
    }
}

/// Probe simulating a client that never answers; counts the attempts.
#[derive(Default)]
pub struct UnreachableProbe {
    pub calls: AtomicUsize,
}

impl UnreachableProbe {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for UnreachableProbe {
    async fn check(&self, client: &Client) -> Result<bool, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ClientError::UnexpectedResponse {
            client: client.name().to_string(),
            message: "connection refused".to_string(),
        })
    }
}

pub fn services(clients: &[&str], probe: Arc<dyn HealthProbe>) -> ServicesProvider {
    let pool = ClientPool::with_probe(probe);
    for name in clients {
        pool.add_client(ClientConfig {
            name: name.to_string(),
            consensus_url: Some(format!("http://{}.invalid:5052", name)),
            execution_url: Some(format!("http://{}.invalid:8545", name)),
        })
        .expect("valid test client");
    }
    ServicesProvider::from_pool(Arc::new(pool), ValidatorNames::default())
}

/// Scripted test task: writes `set`, waits `wait`, checks `expect` (a null
/// expectation means "must be unset") and finally fails if `fail` is set.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptConfig {
    #[serde(default)]
    pub set: HashMap<String, serde_json::Value>,
    #[serde(default, with = "humantime_serde")]
    pub wait: Option<Duration>,
    #[serde(default)]
    pub expect: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub fail: bool,
}

impl TaskConfig for ScriptConfig {}

pub struct ScriptTask {
    config: ScriptConfig,
}

#[async_trait]
impl Task for ScriptTask {
    async fn execute(
        &self,
        ctx: &TaskContext,
        _services: &ServicesProvider,
        vars: &Variables,
    ) -> anyhow::Result<()> {
        for (key, value) in &self.config.set {
            vars.set(key.clone(), value.clone());
        }
        if let Some(wait) = self.config.wait {
            ctx.sleep(wait).await?;
        }
        for (key, expected) in &self.config.expect {
            let actual = vars.get(key);
            let matches = match (expected, &actual) {
                (serde_json::Value::Null, None) => true,
                (expected, Some(actual)) => expected == actual,
                _ => false,
            };
            if !matches {
                bail!("variable '{}' is {:?}, expected {}", key, actual, expected);
            }
        }
        if self.config.fail {
            bail!("scripted failure");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmptyConfig {}

impl TaskConfig for EmptyConfig {}

/// Never returns and never looks at its context.
pub struct HangTask;

#[async_trait]
impl Task for HangTask {
    async fn execute(
        &self,
        _ctx: &TaskContext,
        _services: &ServicesProvider,
        _vars: &Variables,
    ) -> anyhow::Result<()> {
        std::future::pending().await
    }
}

/// Built-in task types plus `script` and `hang`.
pub fn registry() -> TaskRegistry {
    let mut registry = TaskRegistry::with_builtin_tasks();
    registry
        .register(TaskDescriptor::new(
            "script",
            "Scripted test task",
            |config: ScriptConfig| ScriptTask { config },
        ))
        .expect("register script");
    registry
        .register(TaskDescriptor::new("hang", "Hangs forever", |_: EmptyConfig| HangTask))
        .expect("register hang");
    registry
}

pub fn scheduler(services: ServicesProvider) -> TaskScheduler {
    TaskScheduler::new(Arc::new(registry()), services, Variables::new())
}

/// Parse a YAML snippet into a task config value.
pub fn yaml(content: &str) -> serde_yaml::Value {
    serde_yaml::from_str(content).expect("valid yaml")
}

pub struct TestPlanBuilder {
    name: String,
    variables: Vec<(String, String)>,
    tasks: Vec<String>,
}

impl TestPlanBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            variables: Vec::new(),
            tasks: Vec::new(),
        }
    }

    pub fn with_variable(mut self, key: &str, value: &str) -> Self {
        self.variables.push((key.to_string(), value.to_string()));
        self
    }

    /// Append a root task; `config` is an inline YAML flow mapping.
    pub fn with_task(mut self, name: &str, config: &str) -> Self {
        self.tasks
            .push(format!("  - name: {}\n    config: {}\n", name, config));
        self
    }

    pub fn with_timed_task(mut self, name: &str, timeout: &str, config: &str) -> Self {
        self.tasks.push(format!(
            "  - name: {}\n    timeout: {}\n    config: {}\n",
            name, timeout, config
        ));
        self
    }

    pub fn to_yaml(&self) -> String {
        let mut yaml = format!("name: {}\n", self.name);
        if !self.variables.is_empty() {
            yaml.push_str("variables:\n");
            for (key, value) in &self.variables {
                yaml.push_str(&format!("  {}: {}\n", key, value));
            }
        }
        yaml.push_str("tasks:\n");
        for task in &self.tasks {
            yaml.push_str(task);
        }
        yaml
    }

    pub fn write_to_file(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_yaml())
    }
}

pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn create_plan_file(&self, name: &str, builder: &TestPlanBuilder) -> PathBuf {
        let path = self.path().join(format!("{}.yaml", name));
        builder
            .write_to_file(&path)
            .expect("Failed to write test plan file");
        path
    }

    pub fn create_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path().join(name);
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_builder() {
        let yaml = TestPlanBuilder::new("plan")
            .with_variable("height", "100")
            .with_task("sleep", "{ duration: 1s }")
            .to_yaml();

        let plan = beaconflow::TestPlan::from_yaml(&yaml).unwrap();
        assert_eq!(plan.name, "plan");
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.variables["height"], serde_json::json!(100));
    }
}

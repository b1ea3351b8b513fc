// ABOUTME: Task trait, typed configuration schema and the task type registry
// ABOUTME: Also hosts the built-in task types (health check, sleep, composites)

pub mod check_clients_are_healthy;
pub mod run_tasks;
pub mod run_tasks_concurrent;
pub mod sleep;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

use crate::engine::error::{ExecutionError, Result};
use crate::engine::{TaskContext, TaskOptions};
use crate::services::ServicesProvider;
use crate::vars::Variables;

/// Runnable logic of a resolved task, bound to its typed configuration.
#[async_trait]
pub trait Task: Send + Sync {
    /// Run the task. Implementations must stop promptly once `ctx` is
    /// cancelled and must not leave background work running on return.
    async fn execute(
        &self,
        ctx: &TaskContext,
        services: &ServicesProvider,
        vars: &Variables,
    ) -> anyhow::Result<()>;

    /// Child tasks of a composite task, resolved together with the parent.
    fn child_tasks(&self) -> &[TaskOptions] {
        &[]
    }
}

/// Typed configuration schema of a task type.
pub trait TaskConfig: DeserializeOwned + Send + Sync + 'static {
    /// Range and consistency checks beyond what deserialization enforces.
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

type Resolver =
    dyn Fn(serde_yaml::Value) -> std::result::Result<Box<dyn Task>, String> + Send + Sync;

pub struct TaskDescriptor {
    name: String,
    description: String,
    resolve: Box<Resolver>,
}

impl TaskDescriptor {
    /// Bind a configuration schema `C` to a pure factory producing the task.
    pub fn new<C, T, F>(name: impl Into<String>, description: impl Into<String>, factory: F) -> Self
    where
        C: TaskConfig,
        T: Task + 'static,
        F: Fn(C) -> T + Send + Sync + 'static,
    {
        let resolve = move |raw: serde_yaml::Value| {
            // A missing config body means "all defaults"
            let raw = if raw.is_null() {
                serde_yaml::Value::Mapping(serde_yaml::Mapping::new())
            } else {
                raw
            };
            let config: C = serde_yaml::from_value(raw).map_err(|e| e.to_string())?;
            config.validate()?;
            Ok(Box::new(factory(config)) as Box<dyn Task>)
        };

        Self {
            name: name.into(),
            description: description.into(),
            resolve: Box::new(resolve),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Maps task type names to their schema and factory.
///
/// Populated once at startup and shared read-only afterwards.
pub struct TaskRegistry {
    descriptors: HashMap<String, TaskDescriptor>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            descriptors: HashMap::new(),
        }
    }

    /// Registry containing every built-in task type.
    pub fn with_builtin_tasks() -> Self {
        let mut registry = Self::new();
        for descriptor in [
            check_clients_are_healthy::descriptor(),
            run_tasks::descriptor(),
            run_tasks_concurrent::descriptor(),
            sleep::descriptor(),
        ] {
            registry
                .descriptors
                .insert(descriptor.name.clone(), descriptor);
        }
        registry
    }

    pub fn register(&mut self, descriptor: TaskDescriptor) -> Result<()> {
        if self.descriptors.contains_key(&descriptor.name) {
            return Err(ExecutionError::DuplicateTaskType {
                name: descriptor.name,
            });
        }
        self.descriptors.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    /// Decode `raw` with the schema of `name` and build the task.
    pub fn resolve(&self, name: &str, raw: &serde_yaml::Value) -> Result<Box<dyn Task>> {
        let descriptor = self
            .descriptors
            .get(name)
            .ok_or_else(|| ExecutionError::UnknownTaskType {
                name: name.to_string(),
            })?;

        (descriptor.resolve)(raw.clone()).map_err(|message| ExecutionError::ConfigError {
            name: name.to_string(),
            message,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    /// `(name, description)` of every registered type, sorted by name.
    pub fn list(&self) -> Vec<(&str, &str)> {
        let mut types: Vec<_> = self
            .descriptors
            .values()
            .map(|d| (d.name(), d.description()))
            .collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

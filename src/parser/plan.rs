// ABOUTME: Test plan data structure and YAML parsing
// ABOUTME: A plan names its initial variables and the ordered list of root tasks

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::error::{ParserError, Result};
use crate::engine::TaskOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestPlan {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub variables: HashMap<String, serde_json::Value>,
    /// Root tasks in execution order.
    pub tasks: Vec<TaskOptions>,
}

impl TestPlan {
    /// Parse a test plan from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ParserError::IoError)?;
        Self::from_yaml(&content)
    }

    /// Parse a test plan from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let plan: TestPlan = serde_yaml::from_str(content).map_err(ParserError::YamlError)?;
        plan.validate_structure()?;
        Ok(plan)
    }

    fn validate_structure(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ParserError::MissingField("name".to_string()));
        }
        if self.tasks.is_empty() {
            return Err(ParserError::EmptyPlan);
        }
        // Type names are checked against the registry when tasks are added
        if let Some(index) = self.tasks.iter().position(|t| t.name.trim().is_empty()) {
            return Err(ParserError::EmptyTaskName { index });
        }
        Ok(())
    }

    /// Layer `vars` over the plan's own variables.
    pub fn merge_variables(&mut self, vars: HashMap<String, serde_json::Value>) {
        self.variables.extend(vars);
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(ParserError::YamlError)
    }
}

// ABOUTME: Error types for test plan parsing
// ABOUTME: Separates I/O and YAML failures from structural problems in a plan

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Failed to read test plan file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Empty test plan: no tasks defined")]
    EmptyPlan,

    #[error("Task #{index} has an empty task type name")]
    EmptyTaskName { index: usize },
}

pub type Result<T> = std::result::Result<T, ParserError>;

// ABOUTME: Main library module for the beaconflow task orchestration engine
// ABOUTME: Exports all core modules and provides the public API

pub mod cli;
pub mod engine;
pub mod parser;
pub mod services;
pub mod tasks;
pub mod vars;

// Re-export commonly used types
pub use cli::{App, Args, Config};
pub use engine::{
    ExecutionError, RunStatus, RunSummary, TaskContext, TaskId, TaskOptions, TaskScheduler,
    TaskStatus,
};
pub use parser::TestPlan;
pub use services::ServicesProvider;
pub use tasks::{Task, TaskConfig, TaskDescriptor, TaskRegistry};
pub use vars::Variables;

// Error handling
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

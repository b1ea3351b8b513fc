// ABOUTME: Task execution engine: instances, contexts, scheduling and results
// ABOUTME: Runs root tasks in order with per-task timeouts and downward cancellation

pub mod context;
pub mod error;
pub mod instance;
pub mod poll;
pub mod result;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::TaskContext;
pub use error::{ExecutionError, Result};
pub use instance::{raw_config, TaskId, TaskInstance, TaskOptions, TaskState, TaskStatus};
pub use poll::poll_until;
pub use result::{RunStatus, RunSummary, StatusCounts, TaskSnapshot};
pub use scheduler::TaskScheduler;

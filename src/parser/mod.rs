// ABOUTME: Parser module for YAML test plan definitions
// ABOUTME: Exports the test plan structure and its parsing errors

pub mod error;
pub mod plan;

pub use error::{ParserError, Result};
pub use plan::TestPlan;

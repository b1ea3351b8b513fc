// ABOUTME: Command line argument definitions and parsing using Clap
// ABOUTME: Defines the main CLI structure and subcommands for beaconflow

use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "beaconflow")]
#[command(about = "Run ordered test plans of health checks and actions against Ethereum clients")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Path to configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a test plan from a YAML file
    Run {
        #[arg(help = "Path to test plan YAML file")]
        plan: PathBuf,

        #[arg(short = 'V', long = "var", help = "Set a variable (key=value)")]
        vars: Vec<String>,

        #[arg(long, default_value_t = 0, help = "Index of the first root task to run")]
        start_index: usize,
    },

    /// Resolve every task of a test plan without executing it
    Validate {
        #[arg(help = "Path to test plan YAML file")]
        plan: PathBuf,
    },

    /// List the registered task types
    Tasks,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parse variables from key=value format. Values are read as YAML
    /// scalars, so `height=100` binds a number and `name=foo` a string.
    pub fn parse_variables(vars: &[String]) -> anyhow::Result<HashMap<String, serde_json::Value>> {
        let mut variables = HashMap::new();

        for var in vars {
            let Some((key, value)) = var.split_once('=') else {
                return Err(anyhow::anyhow!(
                    "Invalid variable format '{}'. Expected 'key=value'",
                    var
                ));
            };
            if key.trim().is_empty() {
                return Err(anyhow::anyhow!("Empty variable name in '{}'", var));
            }
            let value = match serde_yaml::from_str::<serde_json::Value>(value) {
                Ok(parsed) if !parsed.is_null() => parsed,
                _ => serde_json::Value::String(value.to_string()),
            };
            variables.insert(key.trim().to_string(), value);
        }

        Ok(variables)
    }
}

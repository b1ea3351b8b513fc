// ABOUTME: Configuration management for the beaconflow application
// ABOUTME: Handles loading and merging configuration from files and environment variables

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::{ClientConfig, NamesConfig};

fn default_probe_timeout() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Client endpoints added to the pool at startup.
    #[serde(default)]
    pub endpoints: Vec<ClientConfig>,

    #[serde(default)]
    pub validator_names: NamesConfig,

    /// Request timeout of a single health probe.
    #[serde(with = "humantime_serde", default = "default_probe_timeout")]
    pub probe_timeout: Duration,

    #[serde(default)]
    pub variables: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            endpoints: Vec::new(),
            validator_names: NamesConfig::default(),
            probe_timeout: default_probe_timeout(),
            variables: HashMap::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file path or default locations
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => Self::find_config_file(),
        };

        let mut config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            serde_yaml::from_str(&contents)?
        } else {
            Config::default()
        };
        config.merge_env();
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> PathBuf {
        let possible_paths = [
            PathBuf::from("beaconflow.yaml"),
            PathBuf::from("beaconflow.yml"),
            PathBuf::from(".beaconflow.yaml"),
        ];

        for path in possible_paths {
            if path.exists() {
                return path;
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(".beaconflow").join("config.yaml");
            if home_config.exists() {
                return home_config;
            }
        }

        // Default path (may not exist)
        PathBuf::from("beaconflow.yaml")
    }

    /// Merge environment variables into configuration
    fn merge_env(&mut self) {
        if let Ok(level) = std::env::var("BEACONFLOW_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("BEACONFLOW_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Layer `vars` over the configured variables.
    pub fn merge_variables(&mut self, vars: HashMap<String, serde_json::Value>) {
        self.variables.extend(vars);
    }
}

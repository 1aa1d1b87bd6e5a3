//! Agent configuration

use anyhow::{Context, Result};
use detector_lib::DetectorConfig;
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variable naming an optional TOML configuration file
pub const CONFIG_FILE_ENV: &str = "SYSGUARD_CONFIG";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Host name reported in structured logs
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Directory holding scaler.json, model.json and threshold.json
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    /// Detector tuning
    #[serde(default)]
    pub detector: DetectorConfig,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("./artifacts")
}

impl AgentConfig {
    /// Load configuration from the file named by `SYSGUARD_CONFIG` (if any)
    /// and `SYSGUARD_*` environment variables
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_ENV).ok();
        Self::load_from(file.as_deref())
    }

    /// Load configuration from an optional file plus the environment
    ///
    /// Nested keys use a double underscore, e.g. `SYSGUARD_DETECTOR__ALPHA`.
    pub fn load_from(file: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("SYSGUARD")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read agent configuration")?;

        let agent: AgentConfig = config
            .try_deserialize()
            .context("Invalid agent configuration")?;
        agent
            .detector
            .validate()
            .context("Invalid detector configuration")?;

        Ok(agent)
    }
}

//! Agent configuration

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration for the greenhouse agent, loaded from a JSON file.
///
/// The file path comes from `GREENHOUSE_AGENT_CONFIG` or defaults to
/// `greenhouse-agent.json` in the working directory.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Telemetry platform account (scopes feed topics)
    pub platform_username: String,
    /// Telemetry platform API key
    pub platform_key: String,
    /// Telemetry REST base URL
    #[serde(default = "default_base_url")]
    pub platform_base_url: String,

    /// Python interpreter for the inference scripts
    #[serde(default = "default_interpreter")]
    pub interpreter: PathBuf,
    /// Root directory of the per-device model directories
    pub model_root: PathBuf,

    /// Directory for the JSON-file stores
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Seconds between synchronization passes. Also bounds how stale the
    /// decision loop's sensor view can be.
    #[serde(default = "default_interval")]
    pub sync_interval_secs: u64,
    /// Seconds between decision ticks
    #[serde(default = "default_interval")]
    pub control_interval_secs: u64,
    /// Upper bound on one prediction invocation, in seconds
    #[serde(default = "default_prediction_timeout")]
    pub prediction_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://io.adafruit.com/api/v2".to_string()
}

fn default_interpreter() -> PathBuf {
    PathBuf::from("python3")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_interval() -> u64 {
    5
}

fn default_prediction_timeout() -> u64 {
    30
}

impl AgentConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config {}: {e}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("failed to parse config {}: {e}", path.display()))?;
        Ok(config)
    }

    /// Resolve the config file path from the environment
    #[must_use]
    pub fn default_path() -> PathBuf {
        std::env::var_os("GREENHOUSE_AGENT_CONFIG")
            .map_or_else(|| PathBuf::from("greenhouse-agent.json"), PathBuf::from)
    }
}

//! `devcrew.toml` loading.

use devcrew_core::{DevcrewError, DevcrewResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct DevcrewConfig {
    /// Seconds between orchestration cycles.
    #[serde(default = "default_interval")]
    pub interval_secs: f64,
    #[serde(default = "default_true")]
    pub setup_demo_tasks: bool,
    #[serde(default = "default_true")]
    pub use_mock_clients: bool,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryConfig {
    /// Directory for the long-term log. In-process memory only when unset.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Agent roster. Without an `[agents]` table one agent of each kind is created.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentsConfig {
    #[serde(default)]
    pub code_generators: Vec<AgentEntry>,
    #[serde(default)]
    pub test_writers: Vec<AgentEntry>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            code_generators: vec![AgentEntry {
                name: "Code Generator".into(),
            }],
            test_writers: vec![AgentEntry {
                name: "Test Writer".into(),
            }],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentEntry {
    pub name: String,
}

fn default_interval() -> f64 {
    5.0
}

fn default_true() -> bool {
    true
}

impl Default for DevcrewConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            setup_demo_tasks: true,
            use_mock_clients: true,
            memory: MemoryConfig::default(),
            agents: AgentsConfig::default(),
        }
    }
}

impl DevcrewConfig {
    pub fn parse(raw: &str) -> DevcrewResult<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| DevcrewError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read `path`, falling back to defaults when the file does not exist.
    pub async fn load(path: &Path) -> DevcrewResult<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => {
                let config = Self::parse(&raw)?;
                info!(path = %path.display(), "Loaded configuration");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(DevcrewError::Config(format!(
                "Failed to read config file '{}': {e}",
                path.display()
            ))),
        }
    }

    fn validate(&self) -> DevcrewResult<()> {
        if !self.interval_secs.is_finite() || self.interval_secs <= 0.0 {
            return Err(DevcrewError::Config(format!(
                "interval_secs must be positive, got {}",
                self.interval_secs
            )));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_secs)
    }
}

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{NodeError, Result};

/// Capture node configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Node id stamped on every frame, 1-255. Zero is never assigned.
    pub node_id: u8,

    /// Hub frame listener, e.g. `192.168.1.10:65432`.
    pub hub_addr: String,

    /// Seconds between send cycles.
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,

    /// Seconds to wait for a hub connection before giving up on a cycle.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Where the latest snapshot comes from.
    pub capture: CaptureConfig,
}

/// File-backed capture source settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// Snapshot file the camera pipeline overwrites with the newest image,
    /// e.g. `/dev/shm/latest.jpg`.
    pub path: PathBuf,

    /// Milliseconds between modification checks.
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
}

fn default_period_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_poll_ms() -> u64 {
    500
}

impl NodeConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| NodeError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no node may run with.
    pub fn validate(&self) -> Result<()> {
        if self.node_id == 0 {
            return Err(NodeError::Config("node_id 0 is reserved, use 1-255".into()));
        }
        if self.period_secs == 0 {
            return Err(NodeError::Config("period_secs must be at least 1".into()));
        }
        if self.capture.poll_ms == 0 {
            return Err(NodeError::Config("capture.poll_ms must be at least 1".into()));
        }
        Ok(())
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

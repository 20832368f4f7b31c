use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{HubError, Result};

/// Ingestion hub configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Address the frame listener binds, e.g. `0.0.0.0:65432`.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Upper bound on a declared payload length in bytes. Larger
    /// declarations are protocol errors, rejected before any allocation.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: u32,

    /// Seconds a single header or payload read may stall before the
    /// connection is abandoned. Zero disables the timeout.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:65432".to_string()
}

fn default_max_payload_bytes() -> u32 {
    64 * 1024 * 1024
}

fn default_read_timeout_secs() -> u64 {
    30
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_payload_bytes: default_max_payload_bytes(),
            read_timeout_secs: default_read_timeout_secs(),
        }
    }
}

impl HubConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HubError::Config(format!("Failed to read config: {e}")))?;
        serde_yaml::from_str(&content)
            .map_err(|e| HubError::Config(format!("Failed to parse config: {e}")))
    }

    /// Read timeout as a duration, `None` when disabled.
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_secs > 0).then(|| Duration::from_secs(self.read_timeout_secs))
    }
}

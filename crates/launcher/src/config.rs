use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use stillgrid::message::topics;

use crate::error::{LauncherError, Result};

/// Launcher configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LauncherConfig {
    /// Node id this launcher manages, 1-255.
    pub node_id: u8,

    /// MQTT broker host.
    #[serde(default = "default_broker_host")]
    pub broker_host: String,

    /// MQTT broker port.
    #[serde(default = "default_broker_port")]
    pub broker_port: u16,

    /// Topic prefix shared by every launcher on the broker.
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    /// MQTT keep-alive interval in seconds. The broker uses 1.5x this to
    /// detect a dead launcher and deliver the last will.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Capture process executable.
    pub executable: PathBuf,

    /// Arguments handed to the capture process.
    #[serde(default)]
    pub args: Vec<String>,

    /// Seconds a stopping child gets between the termination request and
    /// the forced kill.
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,
}

fn default_broker_host() -> String {
    "127.0.0.1".to_string()
}

fn default_broker_port() -> u16 {
    1883
}

fn default_topic_prefix() -> String {
    topics::DEFAULT_PREFIX.to_string()
}

fn default_keep_alive_secs() -> u64 {
    60
}

fn default_grace_secs() -> u64 {
    5
}

impl LauncherConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LauncherError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| LauncherError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no launcher may run with.
    pub fn validate(&self) -> Result<()> {
        if self.node_id == 0 {
            return Err(LauncherError::Config(
                "node_id 0 is reserved, use 1-255".into(),
            ));
        }
        if self.keep_alive_secs < 5 {
            return Err(LauncherError::Config(
                "keep_alive_secs must be at least 5".into(),
            ));
        }
        Ok(())
    }

    /// Fail fast when the capture executable cannot exist. A launcher that
    /// can never start its process should say so at startup, not on the
    /// first start command.
    pub fn check_executable(&self) -> Result<()> {
        if !self.executable.exists() {
            return Err(LauncherError::Config(format!(
                "Capture executable {} does not exist",
                self.executable.display()
            )));
        }
        Ok(())
    }

    /// MQTT client identifier, also recorded as `id_full` in presence.
    pub fn client_id(&self) -> String {
        format!("{}-launcher-{}", self.topic_prefix, self.node_id)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

//! Command and presence schemas for the MQTT control channel.
//!
//! Operators publish [`CommandMessage`]s on a per-node command topic; each
//! launcher answers with retained [`PresenceRecord`]s on a shared status
//! topic, and arms the `offline` record as its last will so observers learn
//! about crashes without polling.

use serde::{Deserialize, Serialize};

/// Verbs a launcher accepts on its command topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
}

impl Command {
    /// Parse a wire verb. `None` is a well-formed envelope with an unknown
    /// verb, which callers report separately from malformed JSON.
    pub fn parse(verb: &str) -> Option<Self> {
        match verb {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

/// JSON envelope for a single remote command: `{"command": "start"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMessage {
    pub command: String,
}

impl CommandMessage {
    pub fn start() -> Self {
        Self {
            command: Command::Start.as_str().to_string(),
        }
    }

    pub fn stop() -> Self {
        Self {
            command: Command::Stop.as_str().to_string(),
        }
    }

    /// The parsed verb, if this envelope carries a known one.
    pub fn verb(&self) -> Option<Command> {
        Command::parse(&self.command)
    }
}

/// Availability states carried in a presence record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

impl PresenceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

/// Retained record describing one launcher's availability.
///
/// `id` is the decimal node id, `id_full` the MQTT client identifier. The
/// same shape serves the retained `online` publish, the explicit `offline`
/// on clean shutdown, and the broker-delivered last will.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub id: String,
    pub id_full: String,
    pub status: PresenceStatus,
}

impl PresenceRecord {
    pub fn new(node_id: u8, client_id: &str, status: PresenceStatus) -> Self {
        Self {
            id: node_id.to_string(),
            id_full: client_id.to_string(),
            status,
        }
    }

    pub fn online(node_id: u8, client_id: &str) -> Self {
        Self::new(node_id, client_id, PresenceStatus::Online)
    }

    pub fn offline(node_id: u8, client_id: &str) -> Self {
        Self::new(node_id, client_id, PresenceStatus::Offline)
    }
}

/// Topic layout for the control channel.
///
/// Everything hangs under one configurable prefix so several deployments can
/// share a broker without colliding.
pub mod topics {
    /// Default topic prefix.
    pub const DEFAULT_PREFIX: &str = "stillgrid";

    /// Command topic for one node's launcher, e.g. `stillgrid/node/3/command`.
    pub fn command(prefix: &str, node_id: u8) -> String {
        format!("{prefix}/node/{node_id}/command")
    }

    /// Shared presence topic every launcher publishes its records on.
    pub fn presence(prefix: &str) -> String {
        format!("{prefix}/status/launcher")
    }
}

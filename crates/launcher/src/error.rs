/// Launcher error types.
#[derive(Debug, thiserror::Error)]
pub enum LauncherError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("MQTT request failed: {0}")]
    MqttClient(#[from] rumqttc::ClientError),

    #[error("Broker connection failed: {0}")]
    MqttConnection(#[from] rumqttc::ConnectionError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LauncherError>;

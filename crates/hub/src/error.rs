/// Ingestion hub error types.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HubError>;

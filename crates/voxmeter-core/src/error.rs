use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoxmeterError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(f64),

    #[error("Replay error at line {line}: {message}")]
    Replay { line: usize, message: String },

    #[error("Call session is no longer running")]
    SessionClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, VoxmeterError>;

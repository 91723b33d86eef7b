use std::path::PathBuf;

/// Core error type.
///
/// Adapter crates map their specific errors into this type so the monitor
/// can log and recover from failures consistently.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid value: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store error: {path}: {reason}")]
    Store { path: PathBuf, reason: String },

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;

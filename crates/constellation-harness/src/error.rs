//! Harness error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Core(#[from] constellation_core::CoreError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    /// Invalid configuration value or flag combination.
    #[error("config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, HarnessError>;

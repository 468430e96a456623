//! Error types shared across the core crate.

use thiserror::Error;

/// Failures raised by the arithmetic oracle, family validation and catalog loading.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A precondition on a numeric argument was violated (e.g. `sigma(0)`).
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A constellation definition failed validation.
    #[error("invalid definition '{name}': {reason}")]
    InvalidDefinition { name: String, reason: String },
    /// Catalog or checkpoint JSON could not be parsed or produced.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub(crate) fn invalid_definition(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

//! Error types shared by the sky-looper crates.

use thiserror::Error;

use crate::time::TimeParseError;

/// Result type alias using LoopError.
pub type LoopResult<T> = Result<T, LoopError>;

/// Primary error type for shared types.
#[derive(Debug, Error)]
pub enum LoopError {
    #[error("Invalid grid definition: {0}")]
    InvalidGrid(String),

    #[error("Invalid configuration value for '{field}': {message}")]
    InvalidConfig { field: String, message: String },

    #[error(transparent)]
    Time(#[from] TimeParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoopError {
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        LoopError::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }
}

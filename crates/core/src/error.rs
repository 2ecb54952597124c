//! Core Error Types
//!
//! Defines the foundational error types shared across the Fidus workspace.
//! Kept dependency-free (only thiserror + std + serde_json) so the transport
//! and application crates can extend them without pulling in HTTP types.

use thiserror::Error;

/// Core error type for the Fidus workspace.
///
/// The transport crate adds HTTP/network variants in `TransportError` and the
/// application crate wraps both in `AppError`.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid lifecycle transition on a message or stream
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Parse errors
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an invalid transition error
    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}

impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}

//! Error Handling
//!
//! Unified error types for the application.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use fidus_core::CoreError;
use fidus_transport::TransportError;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Errors from the chat or preference HTTP clients
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Data model errors (invalid transitions, validation)
    #[error(transparent)]
    Core(#[from] CoreError),

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

    /// A message is already in flight
    #[error("Busy: {0}")]
    Busy(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn busy(msg: impl Into<String>) -> Self {
        Self::Busy(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}

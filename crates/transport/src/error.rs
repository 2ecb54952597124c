//! Transport Errors
//!
//! HTTP and network failures from the chat and preference endpoints, plus
//! the fixed mapping from those failures to privacy-safe user messages.

use thiserror::Error;

/// Errors raised by the transport layer.
///
/// `message` fields carry raw server or network text for logs only; what a
/// user sees always comes from [`ChatFailure::user_message`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// HTTP 500 from the backend
    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// HTTP 401/403
    #[error("Authentication failed (HTTP {status}): {message}")]
    AuthenticationFailed { status: u16, message: String },

    /// HTTP 429
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<u64>,
    },

    /// Any other non-2xx status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Connection failures, aborted bodies
    #[error("Network error: {message}")]
    NetworkError { message: String },

    /// A 2xx response whose body could not be decoded
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    /// Bad base URL, proxy, or client construction failure
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for transport errors
pub type TransportResult<T> = Result<T, TransportError>;

impl TransportError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// HTTP status behind this error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::ServerError { status, .. }
            | TransportError::AuthenticationFailed { status, .. }
            | TransportError::Http { status, .. } => Some(*status),
            TransportError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Which user-facing failure class this error belongs to.
    pub fn failure(&self) -> ChatFailure {
        match self {
            TransportError::ServerError { .. } => ChatFailure::ServiceUnavailable,
            TransportError::AuthenticationFailed { .. } => ChatFailure::Unauthorized,
            TransportError::RateLimited { .. } => ChatFailure::RateLimited,
            _ => ChatFailure::Generic,
        }
    }
}

/// The four failure classes a user can be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatFailure {
    ServiceUnavailable,
    Unauthorized,
    RateLimited,
    Generic,
}

impl ChatFailure {
    pub fn user_message(&self) -> &'static str {
        match self {
            ChatFailure::ServiceUnavailable => {
                "The memory service is having trouble right now. Please try again in a moment."
            }
            ChatFailure::Unauthorized => {
                "Your session could not be verified. Please refresh and try again."
            }
            ChatFailure::RateLimited => {
                "You're sending messages too quickly. Please wait a moment and try again."
            }
            ChatFailure::Generic => {
                "Something went wrong. Please check your connection and try again."
            }
        }
    }
}

/// Map a non-2xx status to a transport error.
///
/// Only 500 counts as a transient service failure; other 5xx codes fall into
/// the generic class like any unexpected status.
pub fn parse_http_error(status: u16, body: &str, retry_after: Option<u64>) -> TransportError {
    match status {
        500 => TransportError::ServerError {
            status,
            message: body.to_string(),
        },
        401 | 403 => TransportError::AuthenticationFailed {
            status,
            message: body.to_string(),
        },
        429 => TransportError::RateLimited {
            message: body.to_string(),
            retry_after,
        },
        _ => TransportError::Http {
            status,
            message: body.to_string(),
        },
    }
}

/// Consume a failed response and turn it into a transport error.
pub(crate) async fn error_from_response(response: reqwest::Response) -> TransportError {
    let status = response.status().as_u16();
    let url = response.url().path().to_string();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    tracing::warn!("[Transport] HTTP {} from {}: {}", status, url, body);
    parse_http_error(status, &body, retry_after)
}

impl From<TransportError> for String {
    fn from(err: TransportError) -> String {
        err.to_string()
    }
}

//! Memory Stream Event Types
//!
//! Events carried by the chat endpoint's Server-Sent-Events body, and the
//! adapter trait that turns raw body lines into those events. Shared by the
//! transport crate (decoding) and the application crate (reduction).

use serde::{Deserialize, Serialize};

use crate::preference::PreferenceConflict;

/// One event from the chat stream, discriminated by its `type` field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemoryStreamEvent {
    /// Server received and validated the message
    Acknowledged,

    /// One chunk of assistant reply text
    Token { content: String },

    /// Stored preferences or situations changed; views should refetch
    PreferencesUpdated,

    /// One or more newly detected conflicts
    PreferenceConflict { conflicts: Vec<PreferenceConflict> },

    /// Stream complete, no more events follow
    Done,

    /// Terminal failure reported by the server
    Error { message: String },

    /// Any `type` this client does not know about
    #[serde(other)]
    Unknown,
}

impl MemoryStreamEvent {
    /// Event name as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            MemoryStreamEvent::Acknowledged => "acknowledged",
            MemoryStreamEvent::Token { .. } => "token",
            MemoryStreamEvent::PreferencesUpdated => "preferences_updated",
            MemoryStreamEvent::PreferenceConflict { .. } => "preference_conflict",
            MemoryStreamEvent::Done => "done",
            MemoryStreamEvent::Error { .. } => "error",
            MemoryStreamEvent::Unknown => "unknown",
        }
    }

    /// Whether no further events should be read after this one.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MemoryStreamEvent::Done | MemoryStreamEvent::Error { .. }
        )
    }
}

/// Errors that can occur while adapting a single stream line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum AdapterError {
    /// Line was a data line but its payload was not valid JSON for an event
    ParseError(String),
    /// Line could not be interpreted at all
    InvalidFormat(String),
}

impl std::fmt::Display for AdapterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            AdapterError::InvalidFormat(msg) => write!(f, "Invalid format: {}", msg),
        }
    }
}

impl std::error::Error for AdapterError {}

/// Trait for turning raw stream lines into memory events.
///
/// A line produces at most one event; non-event lines (comments, blank
/// keep-alives) produce `Ok(None)`.
pub trait StreamAdapter: Send + Sync {
    /// Returns the adapter name for logging.
    fn name(&self) -> &'static str;

    /// Adapt one complete line (without its trailing newline).
    fn adapt(&mut self, line: &str) -> Result<Option<MemoryStreamEvent>, AdapterError>;

    /// Reset adapter state for a new stream.
    fn reset(&mut self) {}
}

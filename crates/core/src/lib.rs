//! Fidus Core
//!
//! Foundational types for the Fidus Memory client workspace. This crate has
//! zero dependencies on HTTP or application-level code.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `identity` - Session identity capability (`SessionIdentity`, `InMemoryIdentity`)
//! - `message` - Chat messages and the user-message delivery lifecycle
//! - `preference` - Preferences, conflicts, situations and update bodies
//! - `proxy` - Proxy configuration shared by HTTP clients
//! - `streaming` - Chat stream event types and adapter trait

pub mod error;
pub mod identity;
pub mod message;
pub mod preference;
pub mod proxy;
pub mod streaming;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Identity ───────────────────────────────────────────────────────────
pub use identity::{InMemoryIdentity, SessionIdentity, USER_ID_HEADER, USER_ID_KEY};

// ── Messages ───────────────────────────────────────────────────────────
pub use message::{ChatMessage, DeliveryStatus, MessageRole};

// ── Preferences ────────────────────────────────────────────────────────
pub use preference::{
    AiConfig, Preference, PreferenceConflict, PreferenceUpdate, RelatedPreference, Sentiment,
    Situation,
};

// ── Proxy Types ────────────────────────────────────────────────────────
pub use proxy::{ProxyConfig, ProxyProtocol};

// ── Streaming Types ────────────────────────────────────────────────────
pub use streaming::{AdapterError, MemoryStreamEvent, StreamAdapter};

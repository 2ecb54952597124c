//! Fidus Transport
//!
//! HTTP side of the Fidus Memory client:
//! - Chat transport that opens the streamed reply for a message
//! - Line-oriented SSE decoding into `MemoryStreamEvent`s
//! - Preference store REST client
//! - HTTP error taxonomy and the HTTP client factory

pub mod chat;
pub mod config;
pub mod error;
pub mod http_client;
mod identity;
pub mod preferences;
pub mod sse;

pub use chat::{ChatClient, ChatTransport};
pub use config::{TransportConfig, DEFAULT_FALLBACK_USER_ID};
pub use error::{parse_http_error, ChatFailure, TransportError, TransportResult};
pub use http_client::build_http_client;
pub use preferences::{MemoryApiClient, PreferenceApi};
pub use sse::{decode_event_stream, ChatEventStream, LineBuffer, SseLineAdapter, MAX_LINE_BYTES};

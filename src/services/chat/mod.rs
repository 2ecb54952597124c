//! Chat
//!
//! Conversation state, the per-submission event reducer, and the service
//! that wires it to a [`fidus_transport::ChatTransport`].

pub mod reducer;
pub mod service;

pub use reducer::{
    ChatState, Effect, EventReducer, Notice, NoticeSource, Outcome, Reduced, RefreshHooks,
    StreamPhase,
};
pub use service::ChatService;

//! Integration Tests Module
//!
//! End-to-end behaviour of the chat client: streamed replies folded into
//! conversation state, conflict resolution cascades, and a full round trip
//! against a mock memory backend.

// Shared fake transport and preference store
mod support;

// Chat submission and stream reduction
mod chat_flow_test;

// Conflict resolution cascades and partial failures
mod conflict_resolution_test;


// HTTP round trip through the real clients
mod backend_roundtrip_test;

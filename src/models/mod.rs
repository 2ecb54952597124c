//! Data Models
//!
//! Application-level data structures. Wire types shared with the transport
//! live in `fidus-core`.

pub mod settings;

pub use settings::*;

//! Storage Layer
//!
//! JSON config and the durable identity slot.

pub mod config;
pub mod identity;

pub use config::*;
pub use identity::*;

//! Utilities
//!
//! Error type and filesystem paths shared by the application.

pub mod error;
pub mod paths;

pub use error::*;
pub use paths::*;

//! Preference Conflicts
//!
//! Pending conflicts surfaced by the chat stream and the cascade of
//! preference writes issued when the user resolves one.

pub mod registry;
pub mod resolution;

pub use registry::ConflictRegistry;
pub use resolution::{
    compute_cascade_requests, ConflictDecision, ConflictResolver, ResolutionPlan,
    ResolutionReport,
};

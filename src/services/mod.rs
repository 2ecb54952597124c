//! Services
//!
//! Chat submission, conflict resolution, and the memory views they refresh.

pub mod chat;
pub mod conflicts;
pub mod disclosure;
pub mod views;

pub use chat::ChatService;
pub use conflicts::ConflictResolver;
pub use disclosure::privacy_disclosure;
pub use views::MemoryViews;

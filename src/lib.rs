//! Fidus Memory - Chat Client Library
//!
//! Application layer of the Fidus Memory client:
//! - Conversation state and the streamed-reply reducer
//! - Preference conflict registry and resolution
//! - Preference and situation views
//! - Storage layer (JSON config, durable identity)

pub mod cli;
pub mod models;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;

pub use models::settings::{AppConfig, SettingsUpdate};
pub use services::chat::{ChatService, ChatState, EventReducer, StreamPhase};
pub use services::conflicts::{
    compute_cascade_requests, ConflictDecision, ConflictRegistry, ConflictResolver,
    ResolutionPlan, ResolutionReport,
};
pub use state::{AppState, Services};
pub use utils::error::{AppError, AppResult};

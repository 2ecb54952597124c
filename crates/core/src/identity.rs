//! Session Identity
//!
//! Capability object for the durable guest identifier. The transport reads
//! it for every request and overwrites it whenever a response assigns one.

use std::sync::{Mutex, PoisonError};

/// Name of the durable slot holding the identity.
pub const USER_ID_KEY: &str = "fidus_user_id";

/// Header carrying the identity in both directions.
pub const USER_ID_HEADER: &str = "X-User-ID";

/// Durable single-slot identity storage.
///
/// All operations are synchronous and infallible from the caller's point of
/// view: storage problems surface as `None` or a silent no-op.
pub trait SessionIdentity: Send + Sync {
    /// The stored identity, or `None` when absent or storage is unavailable.
    fn get(&self) -> Option<String>;

    /// Overwrite the stored identity.
    fn set(&self, id: &str);

    /// Remove the stored identity.
    fn clear(&self);

    fn has(&self) -> bool {
        self.get().is_some()
    }
}

/// Identity held only for the lifetime of the process.
#[derive(Debug, Default)]
pub struct InMemoryIdentity {
    slot: Mutex<Option<String>>,
}

impl InMemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(id.into())),
        }
    }
}

impl SessionIdentity for InMemoryIdentity {
    fn get(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, id: &str) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(id.to_string());
    }

    fn clear(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Whether a server-issued identity is safe to persist and echo back in a
/// header: non-empty, at most 128 chars, ASCII alphanumerics and `-_.:@`.
pub fn is_valid_identity(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '@'))
}

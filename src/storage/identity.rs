//! Durable Identity Store
//!
//! File-backed key-value slots (~/.fidus-memory/identity.json) holding the
//! guest identity assigned by the memory backend.
//!
//! Every failure is logged and degrades to "absent" or a no-op; callers of
//! [`SessionIdentity`] never see an error.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use fidus_core::identity::{SessionIdentity, USER_ID_KEY};

use crate::utils::error::AppResult;
use crate::utils::paths::{ensure_fidus_dir, identity_path};

type Slots = BTreeMap<String, String>;

/// [`SessionIdentity`] persisted to a JSON file.
#[derive(Debug)]
pub struct FileIdentityStore {
    path: PathBuf,
    key: String,
    /// Serializes read-modify-write cycles on the file
    write_lock: Mutex<()>,
}

impl FileIdentityStore {
    /// Store at the default location
    pub fn new() -> AppResult<Self> {
        ensure_fidus_dir()?;
        Ok(Self::at(identity_path()?))
    }

    /// Store at an explicit path; the file is created on first write
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            key: USER_ID_KEY.to_string(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_slots(&self) -> Option<Slots> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Some(Slots::new()),
            Err(e) => {
                tracing::warn!(
                    "[IdentityStore] Failed to read {}: {}",
                    self.path.display(),
                    e
                );
                return None;
            }
        };
        if content.trim().is_empty() {
            return Some(Slots::new());
        }
        match serde_json::from_str(&content) {
            Ok(slots) => Some(slots),
            Err(e) => {
                tracing::warn!(
                    "[IdentityStore] Ignoring unreadable {}: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    fn write_slots(&self, slots: &Slots) -> std::io::Result<()> {
        let content = serde_json::to_string_pretty(slots)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)
    }

    fn modify(&self, op: &str, f: impl FnOnce(&mut Slots)) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        // An unreadable file is replaced rather than blocking identity updates.
        let mut slots = self.read_slots().unwrap_or_default();
        f(&mut slots);
        if let Err(e) = self.write_slots(&slots) {
            tracing::warn!(
                "[IdentityStore] Failed to {} identity in {}: {}",
                op,
                self.path.display(),
                e
            );
        }
    }
}

impl SessionIdentity for FileIdentityStore {
    fn get(&self) -> Option<String> {
        self.read_slots()?
            .remove(&self.key)
            .filter(|id| !id.is_empty())
    }

    fn set(&self, id: &str) {
        let key = self.key.clone();
        self.modify("store", |slots| {
            slots.insert(key, id.to_string());
        });
    }

    fn clear(&self) {
        let key = &self.key;
        self.modify("clear", |slots| {
            slots.remove(key);
        });
    }
}

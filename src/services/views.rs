//! Memory Views
//!
//! Cached preference and situation lists shown next to the chat. Refetched
//! in the background whenever the stream reports that memory changed.

use std::sync::Arc;

use tokio::sync::RwLock;

use fidus_core::preference::{Preference, Situation};
use fidus_transport::PreferenceApi;

use crate::services::chat::RefreshHooks;
use crate::utils::error::{AppError, AppResult};

#[derive(Clone)]
pub struct MemoryViews {
    api: Arc<dyn PreferenceApi>,
    preferences: Arc<RwLock<Vec<Preference>>>,
    situations: Arc<RwLock<Vec<Situation>>>,
}

impl MemoryViews {
    pub fn new(api: Arc<dyn PreferenceApi>) -> Self {
        Self {
            api,
            preferences: Arc::new(RwLock::new(Vec::new())),
            situations: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn preferences(&self) -> Vec<Preference> {
        self.preferences.read().await.clone()
    }

    pub async fn situations(&self) -> Vec<Situation> {
        self.situations.read().await.clone()
    }

    /// Refetch preferences; the cached list is kept on failure.
    pub async fn reload_preferences(&self) -> AppResult<usize> {
        let fresh = self.api.list_preferences().await?;
        let count = fresh.len();
        *self.preferences.write().await = fresh;
        Ok(count)
    }

    /// Refetch situations; the cached list is kept on failure.
    pub async fn reload_situations(&self) -> AppResult<usize> {
        let fresh = self.api.list_situations().await?;
        let count = fresh.len();
        *self.situations.write().await = fresh;
        Ok(count)
    }

    /// Reinforce the cached preference at `position`; returns its new confidence.
    pub async fn accept_preference(&self, position: usize) -> AppResult<f64> {
        let id = self.preference_id(position).await?;
        let confidence = self.api.accept_preference(&id).await?;
        self.reload_after("accept").await;
        Ok(confidence)
    }

    /// Weaken the cached preference at `position`; returns its new confidence.
    pub async fn reject_preference(&self, position: usize) -> AppResult<f64> {
        let id = self.preference_id(position).await?;
        let confidence = self.api.reject_preference(&id).await?;
        self.reload_after("reject").await;
        Ok(confidence)
    }

    /// Delete the cached preference at `position`; returns it.
    pub async fn forget_preference(&self, position: usize) -> AppResult<Preference> {
        let preference = self
            .preferences
            .read()
            .await
            .get(position)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("No preference #{}", position + 1)))?;
        let id = preference
            .id
            .as_deref()
            .ok_or_else(|| AppError::validation("Preference has no id"))?;
        self.api.delete_preference(id).await?;
        self.reload_after("delete").await;
        Ok(preference)
    }

    /// Delete every stored preference; returns how many the store removed.
    pub async fn forget_all_preferences(&self) -> AppResult<u64> {
        let count = self.api.delete_all_preferences().await?;
        self.reload_after("delete all").await;
        Ok(count)
    }

    async fn preference_id(&self, position: usize) -> AppResult<String> {
        let preferences = self.preferences.read().await;
        let preference = preferences
            .get(position)
            .ok_or_else(|| AppError::not_found(format!("No preference #{}", position + 1)))?;
        preference
            .id
            .clone()
            .ok_or_else(|| AppError::validation("Preference has no id"))
    }

    async fn reload_after(&self, action: &str) {
        if let Err(e) = self.reload_preferences().await {
            tracing::warn!("[MemoryViews] Refetch after {} failed: {}", action, e);
        }
    }

    fn spawn_reload(&self, what: &'static str) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("[MemoryViews] No runtime, skipping {} refresh", what);
            return;
        };
        let views = self.clone();
        handle.spawn(async move {
            let result = match what {
                "preferences" => views.reload_preferences().await,
                _ => views.reload_situations().await,
            };
            match result {
                Ok(count) => tracing::debug!("[MemoryViews] Refreshed {} {}", count, what),
                Err(e) => tracing::warn!("[MemoryViews] Failed to refresh {}: {}", what, e),
            }
        });
    }
}

impl RefreshHooks for MemoryViews {
    fn refresh_preferences(&self) {
        self.spawn_reload("preferences");
    }

    fn refresh_situations(&self) {
        self.spawn_reload("situations");
    }
}

impl std::fmt::Debug for MemoryViews {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryViews").finish_non_exhaustive()
    }
}

//! Preference Store Client
//!
//! REST client for the memory backend's preference, situation and config
//! endpoints. Used for conflict resolution writes and for refetching the
//! lists shown next to the chat.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use fidus_core::identity::SessionIdentity;
use fidus_core::preference::{AiConfig, Preference, PreferenceUpdate, Situation};

use crate::config::TransportConfig;
use crate::error::{error_from_response, TransportError, TransportResult};
use crate::identity::{adopt_identity, attach_identity, outbound_identity};

/// Operations against the preference store.
#[async_trait]
pub trait PreferenceApi: Send + Sync {
    /// `PUT /preferences/{key}`
    async fn update_preference(&self, key: &str, update: &PreferenceUpdate) -> TransportResult<()>;

    /// `GET /preferences`
    async fn list_preferences(&self) -> TransportResult<Vec<Preference>>;

    /// `GET /situations`
    async fn list_situations(&self) -> TransportResult<Vec<Situation>>;

    /// Reinforce a stored preference; returns its new confidence.
    async fn accept_preference(&self, preference_id: &str) -> TransportResult<f64>;

    /// Weaken a stored preference; returns its new confidence.
    async fn reject_preference(&self, preference_id: &str) -> TransportResult<f64>;

    async fn delete_preference(&self, preference_id: &str) -> TransportResult<()>;

    /// Returns the number of deleted preferences.
    async fn delete_all_preferences(&self) -> TransportResult<u64>;

    /// `GET /config`
    async fn ai_config(&self) -> TransportResult<AiConfig>;
}

#[derive(Debug, Deserialize)]
struct PreferencesResponse {
    preferences: Vec<Preference>,
}

#[derive(Debug, Deserialize)]
struct SituationsResponse {
    situations: Vec<Situation>,
}

#[derive(Debug, Serialize)]
struct FeedbackRequest<'a> {
    preference_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct FeedbackResponse {
    new_confidence: f64,
}

#[derive(Debug, Deserialize)]
struct DeleteAllResponse {
    count: u64,
}

/// HTTP implementation of [`PreferenceApi`]
pub struct MemoryApiClient {
    client: reqwest::Client,
    base_url: String,
    identity: Arc<dyn SessionIdentity>,
}

impl MemoryApiClient {
    pub fn new(
        client: reqwest::Client,
        config: &TransportConfig,
        identity: Arc<dyn SessionIdentity>,
    ) -> TransportResult<Self> {
        Ok(Self {
            client,
            base_url: config.base()?,
            identity,
        })
    }

    /// URL for a preference key; the key is percent-encoded as one segment.
    pub fn preference_url(&self, key: &str) -> String {
        format!("{}/preferences/{}", self.base_url, urlencoding::encode(key))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Send with identity attached; map non-2xx and adopt response identity.
    async fn execute(&self, request: reqwest::RequestBuilder) -> TransportResult<reqwest::Response> {
        let stored = outbound_identity(self.identity.as_ref());
        let response = attach_identity(request, stored.as_deref())
            .send()
            .await
            .map_err(|e| TransportError::network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        adopt_identity(response.headers(), self.identity.as_ref());
        Ok(response)
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> TransportResult<T> {
        let response = self.execute(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| TransportError::invalid_response(e.to_string()))
    }
}

#[async_trait]
impl PreferenceApi for MemoryApiClient {
    async fn update_preference(&self, key: &str, update: &PreferenceUpdate) -> TransportResult<()> {
        let url = self.preference_url(key);
        tracing::info!(
            "[PreferenceApi] Updating {} = {} ({}, {:.0}%)",
            key,
            update.value,
            update.sentiment,
            update.confidence * 100.0
        );
        self.execute(self.client.put(url).json(update)).await?;
        Ok(())
    }

    async fn list_preferences(&self) -> TransportResult<Vec<Preference>> {
        let body: PreferencesResponse = self
            .execute_json(self.client.get(self.url("preferences")))
            .await?;
        tracing::debug!("[PreferenceApi] Fetched {} preferences", body.preferences.len());
        Ok(body.preferences)
    }

    async fn list_situations(&self) -> TransportResult<Vec<Situation>> {
        let body: SituationsResponse = self
            .execute_json(self.client.get(self.url("situations")))
            .await?;
        tracing::debug!("[PreferenceApi] Fetched {} situations", body.situations.len());
        Ok(body.situations)
    }

    async fn accept_preference(&self, preference_id: &str) -> TransportResult<f64> {
        let request = self
            .client
            .post(self.url("preferences/accept"))
            .json(&FeedbackRequest { preference_id });
        let body: FeedbackResponse = self.execute_json(request).await?;
        Ok(body.new_confidence)
    }

    async fn reject_preference(&self, preference_id: &str) -> TransportResult<f64> {
        let request = self
            .client
            .post(self.url("preferences/reject"))
            .json(&FeedbackRequest { preference_id });
        let body: FeedbackResponse = self.execute_json(request).await?;
        Ok(body.new_confidence)
    }

    async fn delete_preference(&self, preference_id: &str) -> TransportResult<()> {
        self.execute(self.client.delete(self.preference_url(preference_id)))
            .await?;
        Ok(())
    }

    async fn delete_all_preferences(&self) -> TransportResult<u64> {
        let body: DeleteAllResponse = self
            .execute_json(self.client.delete(self.url("preferences")))
            .await?;
        tracing::info!("[PreferenceApi] Deleted {} preferences", body.count);
        Ok(body.count)
    }

    async fn ai_config(&self) -> TransportResult<AiConfig> {
        self.execute_json(self.client.get(self.url("config"))).await
    }
}

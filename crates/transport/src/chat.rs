//! Chat Transport
//!
//! Sends a user message to the memory chat endpoint and exposes the
//! streamed response as a lazy sequence of decoded events.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use fidus_core::identity::SessionIdentity;

use crate::config::TransportConfig;
use crate::error::{error_from_response, TransportError, TransportResult};
use crate::identity::{adopt_identity, attach_identity, outbound_identity};
use crate::sse::{decode_event_stream, ChatEventStream};

/// Anything that can open a chat stream for one message.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send `message` and return its event stream.
    ///
    /// Fails before yielding anything when the server answers non-2xx.
    async fn send(&self, message: &str) -> TransportResult<ChatEventStream>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    user_id: &'a str,
    message: &'a str,
}

/// HTTP implementation of [`ChatTransport`]
pub struct ChatClient {
    client: reqwest::Client,
    endpoint: String,
    fallback_user_id: String,
    identity: Arc<dyn SessionIdentity>,
}

impl ChatClient {
    pub fn new(
        client: reqwest::Client,
        config: &TransportConfig,
        identity: Arc<dyn SessionIdentity>,
    ) -> TransportResult<Self> {
        Ok(Self {
            client,
            endpoint: format!("{}/chat", config.base()?),
            fallback_user_id: config.fallback_user_id.clone(),
            identity,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatTransport for ChatClient {
    async fn send(&self, message: &str) -> TransportResult<ChatEventStream> {
        let stored = outbound_identity(self.identity.as_ref());
        let body = ChatRequest {
            user_id: stored.as_deref().unwrap_or(&self.fallback_user_id),
            message,
        };

        tracing::debug!(
            "[ChatTransport] POST {} (identity: {})",
            self.endpoint,
            if stored.is_some() { "stored" } else { "fallback" }
        );

        let request = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&body);
        let response = attach_identity(request, stored.as_deref())
            .send()
            .await
            .map_err(|e| TransportError::network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        adopt_identity(response.headers(), self.identity.as_ref());

        Ok(decode_event_stream(Box::pin(response.bytes_stream())))
    }
}

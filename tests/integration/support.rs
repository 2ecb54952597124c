//! Test doubles for the transport and preference store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream;
use futures_util::StreamExt;
use tokio::sync::RwLock;

use fidus_core::preference::{
    AiConfig, Preference, PreferenceConflict, PreferenceUpdate, RelatedPreference, Sentiment,
    Situation,
};
use fidus_memory::services::chat::ChatState;
use fidus_transport::{
    decode_event_stream, ChatEventStream, ChatTransport, PreferenceApi, TransportError,
    TransportResult,
};

/// Serves a raw SSE body, split into the given chunks.
pub struct SseTransport {
    chunks: Vec<Vec<u8>>,
}

impl SseTransport {
    pub fn from_chunks(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
        }
    }
}

#[async_trait]
impl ChatTransport for SseTransport {
    async fn send(&self, _message: &str) -> TransportResult<ChatEventStream> {
        let body = stream::iter(
            self.chunks
                .clone()
                .into_iter()
                .map(|c| Ok::<_, std::io::Error>(bytes::Bytes::from(c))),
        );
        Ok(decode_event_stream(body.boxed()))
    }
}

/// Fails before any event is produced.
pub struct FailingTransport(pub TransportError);

#[async_trait]
impl ChatTransport for FailingTransport {
    async fn send(&self, _message: &str) -> TransportResult<ChatEventStream> {
        Err(self.0.clone())
    }
}

/// Records every PUT; keys listed in `failing` answer with HTTP 500.
/// Yields once per call so concurrent resolutions interleave.
/// Feedback and delete calls act on `stored` and are logged in `actions`.
#[derive(Default)]
pub struct RecordingApi {
    pub puts: Mutex<Vec<PreferenceUpdate>>,
    pub failing: Mutex<Vec<String>>,
    pub stored: Mutex<Vec<Preference>>,
    pub actions: Mutex<Vec<String>>,
}

impl RecordingApi {
    pub fn failing_on(keys: &[&str]) -> Self {
        Self {
            failing: Mutex::new(keys.iter().map(|k| k.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn with_preferences(preferences: Vec<Preference>) -> Self {
        Self {
            stored: Mutex::new(preferences),
            ..Self::default()
        }
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }

    fn adjust(&self, id: &str, delta: f64) -> TransportResult<f64> {
        self.actions.lock().unwrap().push(format!(
            "{} {}",
            if delta > 0.0 { "accept" } else { "reject" },
            id
        ));
        let mut stored = self.stored.lock().unwrap();
        let pref = stored
            .iter_mut()
            .find(|p| p.id.as_deref() == Some(id))
            .ok_or_else(|| fidus_transport::parse_http_error(404, "not found", None))?;
        pref.confidence = (pref.confidence + delta).clamp(0.0, 1.0);
        Ok(pref.confidence)
    }

    pub fn puts(&self) -> Vec<PreferenceUpdate> {
        self.puts.lock().unwrap().clone()
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }
}

#[async_trait]
impl PreferenceApi for RecordingApi {
    async fn update_preference(&self, key: &str, update: &PreferenceUpdate) -> TransportResult<()> {
        self.puts.lock().unwrap().push(update.clone());
        tokio::task::yield_now().await;
        if self.failing.lock().unwrap().iter().any(|k| k == key) {
            return Err(fidus_transport::parse_http_error(500, "db locked", None));
        }
        Ok(())
    }

    async fn list_preferences(&self) -> TransportResult<Vec<Preference>> {
        Ok(self.stored.lock().unwrap().clone())
    }

    async fn list_situations(&self) -> TransportResult<Vec<Situation>> {
        Ok(Vec::new())
    }

    async fn accept_preference(&self, id: &str) -> TransportResult<f64> {
        self.adjust(id, 0.1)
    }

    async fn reject_preference(&self, id: &str) -> TransportResult<f64> {
        self.adjust(id, -0.2)
    }

    async fn delete_preference(&self, id: &str) -> TransportResult<()> {
        self.actions.lock().unwrap().push(format!("delete {}", id));
        self.stored.lock().unwrap().retain(|p| p.id.as_deref() != Some(id));
        Ok(())
    }

    async fn delete_all_preferences(&self) -> TransportResult<u64> {
        self.actions.lock().unwrap().push("delete all".to_string());
        let mut stored = self.stored.lock().unwrap();
        let count = stored.len() as u64;
        stored.clear();
        Ok(count)
    }

    async fn ai_config(&self) -> TransportResult<AiConfig> {
        Ok(AiConfig {
            model: "test-model".to_string(),
            provider: "test".to_string(),
            is_local: true,
        })
    }
}

pub fn shared_state() -> Arc<RwLock<ChatState>> {
    Arc::new(RwLock::new(ChatState::new()))
}

pub fn data(event: serde_json::Value) -> String {
    format!("data: {}\n", event)
}

pub fn related(key: &str, value: &str, sentiment: &str, confidence: f64) -> RelatedPreference {
    RelatedPreference {
        key: key.to_string(),
        value: value.to_string(),
        sentiment: Sentiment::from(sentiment),
        confidence,
    }
}

pub fn conflict(key: &str, related: Option<Vec<RelatedPreference>>) -> PreferenceConflict {
    PreferenceConflict {
        key: key.to_string(),
        old_value: "likes it".to_string(),
        old_sentiment: Sentiment::Positive,
        old_confidence: 0.7,
        new_value: "dislikes it".to_string(),
        new_sentiment: Sentiment::Negative,
        new_confidence: 0.6,
        related_preferences: related,
    }
}

pub fn stored_preference(id: &str, key: &str, confidence: f64) -> Preference {
    Preference {
        id: Some(id.to_string()),
        key: key.to_string(),
        value: "likes it".to_string(),
        sentiment: Sentiment::Positive,
        confidence,
        is_exception: false,
        domain: None,
        created_at: None,
        updated_at: None,
        reinforcement_count: 0,
        rejection_count: 0,
    }
}

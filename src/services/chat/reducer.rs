//! Chat Event Reducer
//!
//! Folds the events of one streamed reply into the conversation state.
//!
//! Lifecycle of a single submission:
//! `Idle -> Sending -> Streaming -> Settled(Done | Errored)`.
//! A reducer is created per submitted message and never reused.

use fidus_core::message::ChatMessage;
use fidus_core::streaming::MemoryStreamEvent;
use fidus_transport::{ChatFailure, TransportError};

use crate::services::conflicts::ConflictRegistry;

/// Where a notice came from; both kinds are dismissible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeSource {
    Chat,
    Resolution,
}

/// User-facing notice. Never contains raw server text.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub source: NoticeSource,
    pub message: String,
}

impl Notice {
    pub fn chat(failure: ChatFailure) -> Self {
        Self {
            source: NoticeSource::Chat,
            message: failure.user_message().to_string(),
        }
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        Self {
            source: NoticeSource::Resolution,
            message: message.into(),
        }
    }
}

/// Conversation state shared by the chat service and the conflict resolver.
#[derive(Debug, Clone, Default)]
pub struct ChatState {
    pub messages: Vec<ChatMessage>,
    pub conflicts: ConflictRegistry,
    /// A reply is being waited for
    pub awaiting_response: bool,
    /// Consecutive failed submissions, display only
    pub retry_count: u32,
    pub notice: Option<Notice>,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    fn message_mut(&mut self, id: &str) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| m.id == id)
    }
}

/// How a submission ended
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Done,
    /// `reason` is the raw server or transport text, for logs only
    Errored { reason: String },
    /// The caller stopped reading
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamPhase {
    Idle,
    Sending,
    Streaming,
    Settled(Outcome),
}

impl StreamPhase {
    pub fn is_open(&self) -> bool {
        matches!(self, StreamPhase::Sending | StreamPhase::Streaming)
    }
}

/// Side effects requested by an event, run by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Refetch the preference and situation views
    RefreshViews,
}

/// Result of feeding one event to the reducer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduced {
    /// Not valid in the current phase, or an unknown event type
    Ignored,
    Applied,
    Effect(Effect),
}

impl Reduced {
    pub fn is_applied(&self) -> bool {
        !matches!(self, Reduced::Ignored)
    }
}

/// Hooks behind [`Effect::RefreshViews`]. Fire-and-forget.
pub trait RefreshHooks: Send + Sync {
    fn refresh_preferences(&self);
    fn refresh_situations(&self);
}

#[derive(Debug)]
pub struct EventReducer {
    phase: StreamPhase,
    user_message_id: Option<String>,
    assistant_message_id: Option<String>,
}

impl Default for EventReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl EventReducer {
    pub fn new() -> Self {
        Self {
            phase: StreamPhase::Idle,
            user_message_id: None,
            assistant_message_id: None,
        }
    }

    pub fn phase(&self) -> &StreamPhase {
        &self.phase
    }

    pub fn user_message_id(&self) -> Option<&str> {
        self.user_message_id.as_deref()
    }

    /// Record the submitted message and start waiting for the reply.
    ///
    /// Returns the id of the new user message, or `None` if this reducer
    /// already handled a submission.
    pub fn begin(&mut self, state: &mut ChatState, text: &str) -> Option<String> {
        if self.phase != StreamPhase::Idle {
            tracing::debug!("[EventReducer] begin ignored in phase {:?}", self.phase);
            return None;
        }
        let message = ChatMessage::user(text);
        let id = message.id.clone();
        state.messages.push(message);
        state.awaiting_response = true;
        self.user_message_id = Some(id.clone());
        self.phase = StreamPhase::Sending;
        Some(id)
    }

    /// Apply one stream event.
    pub fn apply(&mut self, state: &mut ChatState, event: &MemoryStreamEvent) -> Reduced {
        if !self.phase.is_open() {
            return self.ignore(event);
        }

        match event {
            MemoryStreamEvent::Acknowledged => {
                if self.phase != StreamPhase::Sending {
                    return self.ignore(event);
                }
                match self.user_message_mut(state).map(|m| m.mark_sent()) {
                    Some(Ok(())) => Reduced::Applied,
                    Some(Err(e)) => {
                        tracing::debug!("[EventReducer] acknowledged not applied: {}", e);
                        Reduced::Ignored
                    }
                    None => self.ignore(event),
                }
            }
            MemoryStreamEvent::PreferencesUpdated => Reduced::Effect(Effect::RefreshViews),
            MemoryStreamEvent::PreferenceConflict { conflicts } => {
                state.conflicts.append(conflicts.iter().cloned());
                tracing::info!(
                    "[EventReducer] {} conflict(s) received, {} pending",
                    conflicts.len(),
                    state.conflicts.len()
                );
                Reduced::Applied
            }
            MemoryStreamEvent::Token { content } => self.apply_token(state, content),
            MemoryStreamEvent::Done => {
                self.phase = StreamPhase::Settled(Outcome::Done);
                state.awaiting_response = false;
                state.retry_count = 0;
                Reduced::Applied
            }
            MemoryStreamEvent::Error { message } => {
                tracing::warn!("[EventReducer] Server reported error: {}", message);
                self.settle_failed(state, message.clone(), ChatFailure::Generic);
                Reduced::Applied
            }
            MemoryStreamEvent::Unknown => self.ignore(event),
        }
    }

    /// The transport failed before or during the stream.
    pub fn fail_transport(&mut self, state: &mut ChatState, error: &TransportError) {
        if !self.phase.is_open() {
            tracing::debug!(
                "[EventReducer] transport failure after settle ignored: {}",
                error
            );
            return;
        }
        tracing::warn!("[EventReducer] Transport failure: {}", error);
        self.settle_failed(state, error.to_string(), error.failure());
    }

    /// The body ended without `done` or `error`.
    pub fn end_of_stream(&mut self, state: &mut ChatState) {
        if self.phase.is_open() {
            self.fail_transport(
                state,
                &TransportError::network("stream ended before completion"),
            );
        }
    }

    /// The caller stopped reading the reply.
    ///
    /// Only the waiting indicator is cleared. The user message keeps its
    /// status and the failure counter is untouched.
    pub fn abort(&mut self, state: &mut ChatState) {
        if !self.phase.is_open() {
            return;
        }
        state.awaiting_response = false;
        self.phase = StreamPhase::Settled(Outcome::Cancelled);
    }

    fn apply_token(&mut self, state: &mut ChatState, content: &str) -> Reduced {
        if let Some(id) = self.assistant_message_id.as_deref() {
            if let Some(message) = state.message_mut(id) {
                if let Err(e) = message.append_content(content) {
                    tracing::debug!("[EventReducer] token not applied: {}", e);
                    return Reduced::Ignored;
                }
                return Reduced::Applied;
            }
            tracing::debug!("[EventReducer] assistant message {} disappeared", id);
            return Reduced::Ignored;
        }

        let message = ChatMessage::assistant(content);
        self.assistant_message_id = Some(message.id.clone());
        state.messages.push(message);
        self.phase = StreamPhase::Streaming;
        Reduced::Applied
    }

    fn settle_failed(&mut self, state: &mut ChatState, reason: String, failure: ChatFailure) {
        if let Some(message) = self.user_message_mut(state) {
            if let Err(e) = message.mark_failed() {
                tracing::debug!("[EventReducer] user message not marked failed: {}", e);
            }
        }
        state.notice = Some(Notice::chat(failure));
        state.retry_count += 1;
        state.awaiting_response = false;
        self.phase = StreamPhase::Settled(Outcome::Errored { reason });
    }

    fn user_message_mut<'a>(&self, state: &'a mut ChatState) -> Option<&'a mut ChatMessage> {
        let id = self.user_message_id.as_deref()?;
        state.message_mut(id)
    }

    fn ignore(&self, event: &MemoryStreamEvent) -> Reduced {
        tracing::debug!(
            "[EventReducer] Ignoring {} in phase {:?}",
            event.kind(),
            self.phase
        );
        Reduced::Ignored
    }
}

//! Chat Service
//!
//! Drives one submission at a time: records the user message, opens the
//! stream, and feeds events to a fresh [`EventReducer`] in arrival order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use fidus_core::streaming::MemoryStreamEvent;
use fidus_transport::ChatTransport;

use super::reducer::{ChatState, Effect, EventReducer, Reduced, RefreshHooks, StreamPhase};
use crate::utils::error::{AppError, AppResult};

/// Clears the in-flight flag when a submission ends, however it ends.
struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ChatService {
    transport: Arc<dyn ChatTransport>,
    state: Arc<RwLock<ChatState>>,
    hooks: Option<Arc<dyn RefreshHooks>>,
    /// Receives every event the reducer applied
    observer: Option<mpsc::Sender<MemoryStreamEvent>>,
    in_flight: Arc<AtomicBool>,
}

impl ChatService {
    pub fn new(transport: Arc<dyn ChatTransport>, state: Arc<RwLock<ChatState>>) -> Self {
        Self {
            transport,
            state,
            hooks: None,
            observer: None,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn RefreshHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn with_observer(mut self, observer: mpsc::Sender<MemoryStreamEvent>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn state(&self) -> Arc<RwLock<ChatState>> {
        self.state.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Copy of the current conversation state
    pub async fn snapshot(&self) -> ChatState {
        self.state.read().await.clone()
    }

    pub async fn dismiss_notice(&self) {
        self.state.write().await.notice = None;
    }

    /// Send `text` and consume the reply.
    ///
    /// Transport and server failures settle the submission as errored and
    /// are reflected in the state; they are not returned as `Err`. `Err` is
    /// reserved for empty input and a submission already in flight.
    /// Cancelling `cancel` stops reading and clears the waiting indicator;
    /// messages, conflicts and the failure counter are left as they are.
    pub async fn submit(&self, text: &str, cancel: CancellationToken) -> AppResult<StreamPhase> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::validation("Message must not be empty"));
        }
        let _guard = InFlightGuard::acquire(&self.in_flight)
            .ok_or_else(|| AppError::busy("A message is already being sent"))?;

        let mut reducer = EventReducer::new();
        {
            let mut state = self.state.write().await;
            state.notice = None;
            reducer.begin(&mut state, text);
        }

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("[ChatService] Cancelled before the stream opened");
                reducer.abort(&mut *self.state.write().await);
                return Ok(reducer.phase().clone());
            }
            opened = self.transport.send(text) => opened,
        };

        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                reducer.fail_transport(&mut *self.state.write().await, &e);
                return Ok(reducer.phase().clone());
            }
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("[ChatService] Cancelled while streaming");
                    reducer.abort(&mut *self.state.write().await);
                    break;
                }
                next = stream.next() => next,
            };

            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    reducer.fail_transport(&mut *self.state.write().await, &e);
                    break;
                }
                None => {
                    reducer.end_of_stream(&mut *self.state.write().await);
                    break;
                }
            };

            let reduced = reducer.apply(&mut *self.state.write().await, &event);
            if let Reduced::Effect(Effect::RefreshViews) = reduced {
                if let Some(hooks) = &self.hooks {
                    hooks.refresh_preferences();
                    hooks.refresh_situations();
                }
            }
            if reduced.is_applied() {
                if let Some(tx) = &self.observer {
                    let _ = tx.send(event.clone()).await;
                }
            }
            if !reducer.phase().is_open() {
                break;
            }
        }

        Ok(reducer.phase().clone())
    }
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("busy", &self.is_busy())
            .field("has_hooks", &self.hooks.is_some())
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}

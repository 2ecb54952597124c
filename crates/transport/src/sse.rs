//! SSE Line Decoding
//!
//! Line-oriented decoding of the chat response body. Only `data: ` lines are
//! events; `event:`/`id:`/`retry:` fields, comments and blank keep-alives are
//! dropped. Not a full SSE implementation.

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};

use fidus_core::streaming::{AdapterError, MemoryStreamEvent, StreamAdapter};

use crate::error::{TransportError, TransportResult};

const DATA_PREFIX: &str = "data: ";

/// Lazy sequence of decoded chat events.
pub type ChatEventStream = Pin<Box<dyn Stream<Item = TransportResult<MemoryStreamEvent>> + Send>>;

/// Longest line kept by [`LineBuffer`]; longer lines are dropped.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Reassembles complete lines from arbitrarily split body chunks.
///
/// Bytes are buffered until a `\n` arrives so multi-byte UTF-8 sequences
/// split across chunks decode correctly. A line longer than the limit is
/// discarded up to its terminating `\n`.
#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    max_line: usize,
    /// Inside an over-long line, skipping to its end
    discarding: bool,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line,
            discarding: false,
        }
    }

    /// Feed one chunk; returns every line completed by it, without the
    /// trailing `\n` or `\r\n`.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;
        while let Some(pos) = rest.iter().position(|b| *b == b'\n') {
            let line = &rest[..pos];
            rest = &rest[pos + 1..];
            if self.discarding {
                self.discarding = false;
                continue;
            }
            if self.pending.len() + line.len() > self.max_line {
                self.drop_line();
                continue;
            }
            self.pending.extend_from_slice(line);
            let raw = std::mem::take(&mut self.pending);
            lines.push(Self::decode(&raw));
        }

        if !self.discarding {
            if self.pending.len() + rest.len() > self.max_line {
                self.drop_line();
                self.discarding = true;
            } else {
                self.pending.extend_from_slice(rest);
            }
        }
        lines
    }

    /// Flush an unterminated final line at end of body.
    pub fn finish(&mut self) -> Option<String> {
        if std::mem::take(&mut self.discarding) || self.pending.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.pending);
        Some(Self::decode(&raw))
    }

    fn drop_line(&mut self) {
        tracing::warn!(
            "[ChatTransport] Skipping stream line longer than {} bytes",
            self.max_line
        );
        self.pending.clear();
    }

    fn decode(raw: &[u8]) -> String {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        String::from_utf8_lossy(raw).into_owned()
    }
}

/// Adapter for the memory chat `data: <json>` line format
#[derive(Debug, Default)]
pub struct SseLineAdapter;

impl SseLineAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl StreamAdapter for SseLineAdapter {
    fn name(&self) -> &'static str {
        "memory-sse"
    }

    fn adapt(&mut self, line: &str) -> Result<Option<MemoryStreamEvent>, AdapterError> {
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return Ok(None);
        };
        serde_json::from_str::<MemoryStreamEvent>(payload)
            .map(Some)
            .map_err(|e| AdapterError::ParseError(format!("{} in {:?}", e, payload)))
    }
}

struct DecodeState<S> {
    body: S,
    lines: LineBuffer,
    adapter: SseLineAdapter,
    ready: VecDeque<MemoryStreamEvent>,
    body_finished: bool,
    terminated: bool,
}

impl<S, E> DecodeState<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    async fn next_event(&mut self) -> Option<TransportResult<MemoryStreamEvent>> {
        loop {
            if self.terminated {
                return None;
            }
            if let Some(event) = self.ready.pop_front() {
                if event.is_terminal() {
                    self.terminated = true;
                }
                return Some(Ok(event));
            }
            if self.body_finished {
                return None;
            }
            match self.body.next().await {
                Some(Ok(chunk)) => {
                    for line in self.lines.push(&chunk) {
                        self.decode_line(&line);
                    }
                }
                Some(Err(e)) => {
                    self.terminated = true;
                    tracing::warn!("[ChatTransport] Body read failed mid-stream: {}", e);
                    return Some(Err(TransportError::network(e.to_string())));
                }
                None => {
                    self.body_finished = true;
                    if let Some(line) = self.lines.finish() {
                        self.decode_line(&line);
                    }
                }
            }
        }
    }

    fn decode_line(&mut self, line: &str) {
        match self.adapter.adapt(line) {
            Ok(Some(event)) => {
                tracing::debug!("[ChatTransport] Decoded {} event", event.kind());
                self.ready.push_back(event);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("[ChatTransport] Skipping malformed stream line: {}", e);
            }
        }
    }
}

/// Decode a raw body stream into chat events.
///
/// The returned stream ends at end-of-body, right after a `done` or `error`
/// event, or after yielding a single error for a failed body read.
pub fn decode_event_stream<S, E>(body: S) -> ChatEventStream
where
    S: Stream<Item = Result<Bytes, E>> + Unpin + Send + 'static,
    E: Display + Send + 'static,
{
    let state = DecodeState {
        body,
        lines: LineBuffer::new(),
        adapter: SseLineAdapter::new(),
        ready: VecDeque::new(),
        body_finished: false,
        terminated: false,
    };
    Box::pin(stream::unfold(state, |mut state| async move {
        let item = state.next_event().await?;
        Some((item, state))
    }))
}

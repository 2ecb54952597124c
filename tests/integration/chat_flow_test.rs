//! Chat Flow Integration Tests
//!
//! Submissions driven through `ChatService` with streamed SSE bodies.

use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use fidus_core::message::{DeliveryStatus, MessageRole};
use fidus_memory::services::chat::{ChatService, ChatState, Outcome, StreamPhase};
use fidus_transport::{parse_http_error, ChatFailure, TransportError};

use crate::support::{conflict, data, shared_state, FailingTransport, SseTransport};

fn jazz_body() -> String {
    [
        data(json!({"type": "acknowledged"})),
        data(json!({"type": "token", "content": "I'll"})),
        data(json!({"type": "token", "content": " remember that."})),
        data(json!({"type": "preferences_updated"})),
        data(json!({"type": "done"})),
    ]
    .concat()
}

async fn run(chunks: &[&str]) -> (StreamPhase, ChatState) {
    let service = ChatService::new(Arc::new(SseTransport::from_chunks(chunks)), shared_state());
    let phase = service
        .submit("I love jazz", CancellationToken::new())
        .await
        .unwrap();
    (phase, service.snapshot().await)
}

fn user_status(state: &ChatState) -> Option<DeliveryStatus> {
    state
        .messages
        .iter()
        .find(|m| m.role == MessageRole::User)
        .and_then(|m| m.status())
}

fn assistant_text(state: &ChatState) -> Option<String> {
    state
        .messages
        .iter()
        .find(|m| m.role == MessageRole::Assistant)
        .map(|m| m.content().to_string())
}

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn test_i_love_jazz_scenario() {
    let body = jazz_body();
    let (phase, state) = run(&[&body]).await;

    assert_eq!(phase, StreamPhase::Settled(Outcome::Done));
    assert_eq!(user_status(&state), Some(DeliveryStatus::Sent));
    assert_eq!(assistant_text(&state).as_deref(), Some("I'll remember that."));
    assert!(state.conflicts.is_empty());
    assert!(!state.awaiting_response);
    assert_eq!(state.retry_count, 0);
    assert!(state.notice.is_none());
}

#[tokio::test]
async fn test_tokens_concatenate_regardless_of_chunking() {
    let body = jazz_body();
    let bytes = body.as_bytes();

    // Every two-chunk split point
    for split in 1..bytes.len() {
        let (a, b) = body.split_at(split);
        let (_, state) = run(&[a, b]).await;
        assert_eq!(
            assistant_text(&state).as_deref(),
            Some("I'll remember that."),
            "split at {}",
            split
        );
    }

    // One byte per chunk with CRLF line endings
    let crlf = body.replace('\n', "\r\n");
    let singles: Vec<String> = crlf.chars().map(|c| c.to_string()).collect();
    let refs: Vec<&str> = singles.iter().map(String::as_str).collect();
    let (phase, state) = run(&refs).await;
    assert_eq!(phase, StreamPhase::Settled(Outcome::Done));
    assert_eq!(assistant_text(&state).as_deref(), Some("I'll remember that."));
}

#[tokio::test]
async fn test_malformed_line_is_skipped() {
    let body = [
        data(json!({"type": "acknowledged"})),
        data(json!({"type": "token", "content": "Hello"})),
        "data: {\"type\": \"token\", \"content\": \n".to_string(),
        ": keep-alive comment\n".to_string(),
        "event: ignored\n".to_string(),
        data(json!({"type": "token", "content": " there"})),
        data(json!({"type": "done"})),
    ]
    .concat();
    let (phase, state) = run(&[&body]).await;

    assert_eq!(phase, StreamPhase::Settled(Outcome::Done));
    assert_eq!(assistant_text(&state).as_deref(), Some("Hello there"));
    assert!(state.notice.is_none());
    assert_eq!(user_status(&state), Some(DeliveryStatus::Sent));
}

#[tokio::test]
async fn test_unknown_event_types_are_ignored() {
    let body = [
        data(json!({"type": "acknowledged"})),
        data(json!({"type": "thinking", "content": "hmm"})),
        data(json!({"type": "done"})),
    ]
    .concat();
    let (phase, state) = run(&[&body]).await;
    assert_eq!(phase, StreamPhase::Settled(Outcome::Done));
    assert!(assistant_text(&state).is_none());
}

// ============================================================================
// Conflicts
// ============================================================================

#[tokio::test]
async fn test_conflict_events_accumulate_in_order() {
    let first = json!({"type": "preference_conflict", "conflicts": [
        conflict("food.pizza", None),
        conflict("music.jazz", None),
    ]});
    let second = json!({"type": "preference_conflict", "conflicts": [
        conflict("food.pizza", None),
    ]});
    let body = [
        data(json!({"type": "acknowledged"})),
        data(first),
        data(json!({"type": "token", "content": "Noted."})),
        data(second),
        data(json!({"type": "done"})),
    ]
    .concat();

    let (_, state) = run(&[&body]).await;
    let keys: Vec<_> = state.conflicts.iter().map(|c| c.key.clone()).collect();
    assert_eq!(keys, vec!["food.pizza", "music.jazz", "food.pizza"]);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_error_event_after_ack() {
    let body = [
        data(json!({"type": "acknowledged"})),
        data(json!({"type": "error", "message": "Traceback: KeyError 'user'"})),
        data(json!({"type": "token", "content": "never applied"})),
    ]
    .concat();
    let (phase, state) = run(&[&body]).await;

    assert!(matches!(
        phase,
        StreamPhase::Settled(Outcome::Errored { ref reason }) if reason.contains("KeyError")
    ));
    assert_eq!(user_status(&state), Some(DeliveryStatus::Error));
    assert!(assistant_text(&state).is_none());
    assert_eq!(state.retry_count, 1);
    let notice = state.notice.unwrap();
    assert_eq!(notice.message, ChatFailure::Generic.user_message());
}

#[tokio::test]
async fn test_http_failures_use_fixed_messages() {
    let cases = [
        (500, ChatFailure::ServiceUnavailable),
        (401, ChatFailure::Unauthorized),
        (403, ChatFailure::Unauthorized),
        (429, ChatFailure::RateLimited),
        (502, ChatFailure::Generic),
    ];
    for (status, failure) in cases {
        let service = ChatService::new(
            Arc::new(FailingTransport(parse_http_error(status, "raw detail", None))),
            shared_state(),
        );
        service.submit("hi", CancellationToken::new()).await.unwrap();
        let state = service.snapshot().await;

        assert_eq!(user_status(&state), Some(DeliveryStatus::Error), "{}", status);
        let notice = state.notice.unwrap();
        assert_eq!(notice.message, failure.user_message(), "{}", status);
        assert!(!notice.message.contains("raw detail"));
    }
}

#[tokio::test]
async fn test_retry_counter_grows_and_resets() {
    let state = shared_state();
    let failing = ChatService::new(
        Arc::new(FailingTransport(TransportError::network("refused"))),
        state.clone(),
    );
    failing.submit("one", CancellationToken::new()).await.unwrap();
    failing.submit("two", CancellationToken::new()).await.unwrap();
    assert_eq!(state.read().await.retry_count, 2);

    let body = jazz_body();
    let working = ChatService::new(Arc::new(SseTransport::from_chunks(&[&body])), state.clone());
    working.submit("three", CancellationToken::new()).await.unwrap();

    let snapshot = state.read().await.clone();
    assert_eq!(snapshot.retry_count, 0);
    assert!(snapshot.notice.is_none());
    assert_eq!(snapshot.messages.len(), 4);
}

#[tokio::test]
async fn test_body_ending_without_done_is_errored() {
    let body = [
        data(json!({"type": "acknowledged"})),
        data(json!({"type": "token", "content": "cut o"})),
    ]
    .concat();
    let (phase, state) = run(&[&body]).await;

    assert!(matches!(phase, StreamPhase::Settled(Outcome::Errored { .. })));
    assert_eq!(user_status(&state), Some(DeliveryStatus::Error));
    assert_eq!(assistant_text(&state).as_deref(), Some("cut o"));
}

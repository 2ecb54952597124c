//! Backend Round Trip Tests
//!
//! The real HTTP clients wired by `AppState` against a mock memory backend,
//! with the identity persisted to a file.

use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fidus_core::identity::SessionIdentity;
use fidus_memory::services::chat::{Outcome, StreamPhase};
use fidus_memory::storage::{ConfigService, FileIdentityStore};
use fidus_memory::{AppState, ConflictDecision};

use crate::support::{conflict, data, related};

fn sse(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

#[tokio::test]
async fn test_chat_then_resolve_against_backend() {
    let server = MockServer::start().await;
    let temp = tempfile::tempdir().unwrap();

    let conflicts = json!({"type": "preference_conflict", "conflicts": [
        conflict("food.pizza", Some(vec![
            related("food.pizza.margherita", "loves it", "positive", 0.9),
        ])),
    ]});
    let first_reply = [
        data(json!({"type": "acknowledged"})),
        data(json!({"type": "token", "content": "Got it."})),
        data(conflicts),
        data(json!({"type": "done"})),
    ]
    .concat();

    // First chat: no identity yet, the backend assigns one.
    Mock::given(method("POST"))
        .and(path("/memory/chat"))
        .respond_with(sse(first_reply).insert_header("X-User-ID", "guest-7f3a"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/memory/preferences/food.pizza"))
        .and(header("X-User-ID", "guest-7f3a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "updated"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/memory/preferences/food.pizza.margherita"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "updated"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/memory/preferences"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"preferences": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/memory/situations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"situations": []})))
        .mount(&server)
        .await;

    let config = ConfigService::open(temp.path().join("config.json"))
        .unwrap()
        .with_backend_override(Some(format!("{}/memory", server.uri())))
        .unwrap();
    let identity_path = temp.path().join("identity.json");
    let identity = Arc::new(FileIdentityStore::at(&identity_path));

    let state = AppState::new();
    state.initialize(config, identity.clone(), None).await.unwrap();
    let services = state.services().await.unwrap();

    let phase = services
        .chat
        .submit("I don't like pizza anymore", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(phase, StreamPhase::Settled(Outcome::Done));

    // Identity persisted to disk and visible through a fresh handle
    assert_eq!(
        FileIdentityStore::at(&identity_path).get().as_deref(),
        Some("guest-7f3a")
    );
    assert_eq!(services.chat.snapshot().await.conflicts.len(), 1);

    let report = services
        .resolver
        .resolve(0, ConflictDecision::AcceptNew)
        .await
        .unwrap();
    assert!(report.is_success());
    assert!(services.chat.snapshot().await.conflicts.is_empty());

    // Second chat carries the stored identity
    Mock::given(method("POST"))
        .and(path("/memory/chat"))
        .and(header("X-User-ID", "guest-7f3a"))
        .respond_with(sse(data(json!({"type": "done"}))))
        .expect(1)
        .mount(&server)
        .await;
    services
        .chat
        .submit("thanks", CancellationToken::new())
        .await
        .unwrap();

    let chats: Vec<_> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/memory/chat")
        .collect();
    assert_eq!(chats.len(), 2);
    assert!(chats[0].headers.get("x-user-id").is_none());
    let first_body: serde_json::Value = chats[0].body_json().unwrap();
    assert_eq!(first_body["user_id"], "user-1");
    let second_body: serde_json::Value = chats[1].body_json().unwrap();
    assert_eq!(second_body["user_id"], "guest-7f3a");
}

#[tokio::test]
async fn test_server_error_leaves_identity_untouched() {
    let server = MockServer::start().await;
    let temp = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/memory/chat"))
        .respond_with(ResponseTemplate::new(500).insert_header("X-User-ID", "guest-bad"))
        .mount(&server)
        .await;

    let config = ConfigService::open(temp.path().join("config.json"))
        .unwrap()
        .with_backend_override(Some(format!("{}/memory", server.uri())))
        .unwrap();
    let identity = Arc::new(FileIdentityStore::at(temp.path().join("identity.json")));

    let state = AppState::new();
    state.initialize(config, identity.clone(), None).await.unwrap();
    let services = state.services().await.unwrap();

    services
        .chat
        .submit("hello", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(identity.get(), None);
    let snapshot = services.chat.snapshot().await;
    assert_eq!(
        snapshot.notice.unwrap().message,
        "The memory service is having trouble right now. Please try again in a moment."
    );
}

//! Conflict Resolution Integration Tests
//!
//! Cascading preference writes issued by `ConflictResolver` and their effect
//! on the pending conflict list.

use std::sync::Arc;

use fidus_core::preference::Sentiment;
use fidus_memory::services::chat::NoticeSource;
use fidus_memory::{ConflictDecision, ConflictResolver};

use crate::support::{conflict, related, shared_state, RecordingApi};

async fn resolver_with(
    conflicts: Vec<fidus_core::preference::PreferenceConflict>,
    api: Arc<RecordingApi>,
) -> (ConflictResolver, Arc<tokio::sync::RwLock<fidus_memory::ChatState>>) {
    let state = shared_state();
    state.write().await.conflicts.append(conflicts);
    (ConflictResolver::new(state.clone(), api), state)
}

// ============================================================================
// Accept new
// ============================================================================

#[tokio::test]
async fn test_accept_new_cascades_negative_sentiment() {
    let api = Arc::new(RecordingApi::default());
    let (resolver, state) = resolver_with(
        vec![conflict(
            "food.pizza",
            Some(vec![
                related("food.pizza.margherita", "loves it", "positive", 0.9),
                related("food.pizza.pepperoni", "likes it", "positive", 0.55),
            ]),
        )],
        api.clone(),
    )
    .await;

    let report = resolver.resolve(0, ConflictDecision::AcceptNew).await.unwrap();

    assert!(report.is_success());
    assert_eq!(
        report.applied,
        vec!["food.pizza", "food.pizza.margherita", "food.pizza.pepperoni"]
    );

    let puts = api.puts();
    assert_eq!(puts.len(), 3);
    assert_eq!(puts[0].key, "food.pizza");
    assert_eq!(puts[0].value, "dislikes it");
    for (put, confidence) in puts[1..].iter().zip([0.9, 0.55]) {
        assert_eq!(put.value, "dislikes it");
        assert_eq!(put.sentiment, Sentiment::Negative);
        assert_eq!(put.confidence, confidence);
        assert_eq!(put.is_exception, None);
    }
    assert!(state.read().await.conflicts.is_empty());
}

#[tokio::test]
async fn test_primary_failure_skips_related_and_keeps_conflict() {
    let api = Arc::new(RecordingApi::failing_on(&["food.pizza"]));
    let (resolver, state) = resolver_with(
        vec![conflict(
            "food.pizza",
            Some(vec![related("food.pizza.margherita", "loves it", "positive", 0.9)]),
        )],
        api.clone(),
    )
    .await;

    let report = resolver.resolve(0, ConflictDecision::AcceptNew).await.unwrap();

    assert!(!report.removed);
    assert!(report.applied.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(api.puts().len(), 1);

    let state = state.read().await;
    assert_eq!(state.conflicts.len(), 1);
    let notice = state.notice.as_ref().unwrap();
    assert_eq!(notice.source, NoticeSource::Resolution);
    assert!(!notice.message.contains("db locked"));
}

#[tokio::test]
async fn test_related_failure_is_partial_and_retry_succeeds() {
    let api = Arc::new(RecordingApi::failing_on(&["food.pizza.margherita"]));
    let (resolver, state) = resolver_with(
        vec![conflict(
            "food.pizza",
            Some(vec![
                related("food.pizza.margherita", "loves it", "positive", 0.9),
                related("food.pizza.pepperoni", "likes it", "positive", 0.5),
            ]),
        )],
        api.clone(),
    )
    .await;

    let report = resolver.resolve(0, ConflictDecision::AcceptNew).await.unwrap();
    // Every related write is still attempted; nothing is rolled back.
    assert_eq!(report.applied, vec!["food.pizza", "food.pizza.pepperoni"]);
    assert_eq!(report.failed[0].0, "food.pizza.margherita");
    assert!(!report.removed);
    assert_eq!(state.read().await.conflicts.len(), 1);

    api.heal();
    let retry = resolver.resolve(0, ConflictDecision::AcceptNew).await.unwrap();
    assert!(retry.is_success());
    assert!(state.read().await.conflicts.is_empty());
    assert_eq!(api.puts().len(), 6);
}

// ============================================================================
// Keep old
// ============================================================================

#[tokio::test]
async fn test_keep_old_marks_related_as_exceptions() {
    let api = Arc::new(RecordingApi::default());
    let (resolver, _state) = resolver_with(
        vec![conflict(
            "food.pizza",
            Some(vec![
                related("food.pizza.margherita", "loves it", "positive", 0.9),
                related("food.pizza.anchovy", "meh", "ambivalent", 0.2),
            ]),
        )],
        api.clone(),
    )
    .await;

    let report = resolver.resolve(0, ConflictDecision::KeepOld).await.unwrap();
    assert!(report.is_success());

    let puts = api.puts();
    assert_eq!(puts.len(), 2);
    assert!(puts.iter().all(|p| p.key != "food.pizza"));
    assert!(puts.iter().all(|p| p.is_exception == Some(true)));
    assert_eq!(puts[0].value, "loves it");
    assert_eq!(puts[0].sentiment, Sentiment::Positive);
    assert_eq!(puts[1].sentiment, Sentiment::from("ambivalent"));
    assert_eq!(puts[1].confidence, 0.2);

    // Unknown sentiment is echoed verbatim on the wire
    let body = serde_json::to_value(&puts[1]).unwrap();
    assert_eq!(body["sentiment"], "ambivalent");
    assert_eq!(body["is_exception"], true);
}

#[tokio::test]
async fn test_keep_old_without_related_makes_no_calls() {
    let api = Arc::new(RecordingApi::default());
    let (resolver, state) =
        resolver_with(vec![conflict("music.jazz", None)], api.clone()).await;

    let report = resolver.resolve(0, ConflictDecision::KeepOld).await.unwrap();

    assert!(report.removed);
    assert!(report.applied.is_empty());
    assert!(api.puts().is_empty());
    assert!(state.read().await.conflicts.is_empty());
}

// ============================================================================
// Registry bookkeeping
// ============================================================================

#[tokio::test]
async fn test_resolving_removes_only_that_conflict() {
    let api = Arc::new(RecordingApi::default());
    let (resolver, state) = resolver_with(
        vec![
            conflict("a", None),
            conflict("b", None),
            conflict("c", None),
        ],
        api,
    )
    .await;

    resolver.resolve(1, ConflictDecision::AcceptNew).await.unwrap();

    let keys: Vec<_> = state
        .read()
        .await
        .conflicts
        .iter()
        .map(|c| c.key.clone())
        .collect();
    assert_eq!(keys, vec!["a", "c"]);
}

#[tokio::test]
async fn test_concurrent_resolutions_remove_the_right_entries() {
    let api = Arc::new(RecordingApi::default());
    let (resolver, state) = resolver_with(
        vec![
            conflict("a", None),
            conflict("b", None),
            conflict("c", None),
        ],
        api,
    )
    .await;

    let (first, last) = tokio::join!(
        resolver.resolve(0, ConflictDecision::AcceptNew),
        resolver.resolve(2, ConflictDecision::AcceptNew),
    );
    assert!(first.unwrap().removed);
    assert!(last.unwrap().removed);

    let remaining: Vec<_> = state
        .read()
        .await
        .conflicts
        .iter()
        .map(|c| c.key.clone())
        .collect();
    assert_eq!(remaining, vec!["b"]);
}

#[tokio::test]
async fn test_dismiss_and_missing_index() {
    let api = Arc::new(RecordingApi::default());
    let (resolver, state) =
        resolver_with(vec![conflict("a", None), conflict("b", None)], api.clone()).await;

    let dismissed = resolver.dismiss(0).await.unwrap();
    assert_eq!(dismissed.key, "a");
    assert_eq!(state.read().await.conflicts.len(), 1);
    assert!(api.puts().is_empty());

    assert!(resolver.dismiss(5).await.is_err());
    assert!(resolver.resolve(5, ConflictDecision::KeepOld).await.is_err());
}

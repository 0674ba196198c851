#![allow(clippy::expect_used, clippy::unwrap_used)]

mod support;

use std::sync::Arc;

use gh_store::config::StoreConfig;
use gh_store::error::StoreError;
use gh_store::store::Store;
use gh_store_core::{UpdateEnvelope, UpdateMode};
use serde_json::json;
use support::InMemoryGateway;

fn store(owner: &str) -> (Arc<InMemoryGateway>, Store<Arc<InMemoryGateway>>) {
    let gateway = Arc::new(InMemoryGateway::new(owner));
    let store = Store::new(Arc::clone(&gateway), StoreConfig::default());
    (gateway, store)
}

/// A single update is replayed into the anchor's state.
#[tokio::test]
async fn single_update_is_replayed() {
    let (_gateway, store) = store("alice");
    let created = store.create("widget-1", json!({"count": 1})).await.unwrap();

    store.update("widget-1", json!({"count": 2})).await.unwrap();
    let object = store.process_updates(created.meta.issue_number).await.unwrap();

    assert_eq!(object.data, json!({"count": 2}));
    // Version counts every comment on the anchor (including the initial-state
    // seed comment), not just the ones consumed this cycle.
    assert_eq!(object.meta.version, 3);
}

/// Nested `append` updates merge recursively rather than overwrite siblings.
#[tokio::test]
async fn nested_append_updates_merge_recursively() {
    let (_gateway, store) = store("alice");
    let created = store
        .create("profile-1", json!({"user": {"name": "Alice", "settings": {"theme": "dark"}}}))
        .await
        .unwrap();

    store
        .update("profile-1", json!({"user": {"settings": {"theme": "light"}}}))
        .await
        .unwrap();
    let object = store.process_updates(created.meta.issue_number).await.unwrap();

    assert_eq!(object.data, json!({"user": {"name": "Alice", "settings": {"theme": "light"}}}));
}

/// A comment from an author who is neither the repo owner nor in
/// CODEOWNERS is skipped rather than replayed.
#[tokio::test]
async fn unauthorized_comment_is_skipped() {
    let (gateway, store) = store("alice");
    let created = store.create("doc-1", json!({"count": 1})).await.unwrap();

    let envelope = UpdateEnvelope::encode(json!({"count": 99}), UpdateMode::Append, None, "attacker/0.0.1", time::OffsetDateTime::now_utc());
    let body = serde_json::to_string(&envelope).unwrap();
    gateway.post_raw_comment(created.meta.issue_number, &body, "mallory").await;

    let object = store.process_updates(created.meta.issue_number).await.unwrap();
    assert_eq!(object.data, json!({"count": 1}));
}

/// Reading through an alias resolves to the canonical object's current state.
#[tokio::test]
async fn alias_redirects_to_canonical_object() {
    let (_gateway, store) = store("alice");
    let created = store.create("canonical-1", json!({"count": 1})).await.unwrap();
    store.create_alias("canonical-1", "alias-1").await.unwrap();

    store.update("canonical-1", json!({"count": 5})).await.unwrap();
    store.process_updates(created.meta.issue_number).await.unwrap();

    let via_alias = store.get("alias-1").await.unwrap();
    let via_canonical = store.get("canonical-1").await.unwrap();
    assert_eq!(via_alias.data, json!({"count": 5}));
    assert_eq!(via_alias.meta.object_id, "canonical-1");
    assert_eq!(via_canonical.data, via_alias.data);
}

/// A `replace`-mode update discards the prior state wholesale.
#[tokio::test]
async fn replace_mode_overwrites_whole_state() {
    let (_gateway, store) = store("alice");
    let created = store.create("config-1", json!({"a": 1, "b": 2})).await.unwrap();

    store.replace("config-1", json!({"c": 3})).await.unwrap();
    let object = store.process_updates(created.meta.issue_number).await.unwrap();

    assert_eq!(object.data, json!({"c": 3}));
}

/// A second update cannot be posted while the anchor still has a pending
/// (unprocessed) update.
#[tokio::test]
async fn concurrent_update_is_refused() {
    let (_gateway, store) = store("alice");
    store.create("task-1", json!({"count": 1})).await.unwrap();

    store.update("task-1", json!({"count": 2})).await.unwrap();
    let err = store.update("task-1", json!({"count": 3})).await.unwrap_err();
    assert!(matches!(err, StoreError::ConcurrentUpdate(id) if id == "task-1"));
}

/// Once the pending update is processed, the anchor accepts another one.
#[tokio::test]
async fn update_after_processing_succeeds() {
    let (_gateway, store) = store("alice");
    let created = store.create("task-2", json!({"count": 1})).await.unwrap();

    store.update("task-2", json!({"count": 2})).await.unwrap();
    store.process_updates(created.meta.issue_number).await.unwrap();
    store.update("task-2", json!({"count": 3})).await.unwrap();
    let object = store.process_updates(created.meta.issue_number).await.unwrap();

    assert_eq!(object.data, json!({"count": 3}));
}

/// Duplicate `create` calls for the same id are rejected.
#[tokio::test]
async fn duplicate_create_is_rejected() {
    let (_gateway, store) = store("alice");
    store.create("dup-1", json!({})).await.unwrap();
    let err = store.create("dup-1", json!({})).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateUid(id, _) if id == "dup-1"));
}

/// `delete` archives the anchor and excludes it from `list`.
#[tokio::test]
async fn delete_excludes_object_from_listing() {
    let (_gateway, store) = store("alice");
    store.create("trash-1", json!({})).await.unwrap();
    store.delete("trash-1").await.unwrap();

    let all = store.list().await.unwrap();
    assert!(all.iter().all(|o| o.meta.object_id != "trash-1"));
}

/// Reprocessing an anchor with no new comments since the last cycle leaves
/// its state unchanged.
#[tokio::test]
async fn reprocessing_without_new_updates_is_idempotent() {
    let (_gateway, store) = store("alice");
    let created = store.create("steady-1", json!({"count": 1})).await.unwrap();
    store.update("steady-1", json!({"count": 2})).await.unwrap();

    let first = store.process_updates(created.meta.issue_number).await.unwrap();
    let second = store.process_updates(created.meta.issue_number).await.unwrap();

    assert_eq!(first.data, second.data);
    assert_eq!(first.data, json!({"count": 2}));
}

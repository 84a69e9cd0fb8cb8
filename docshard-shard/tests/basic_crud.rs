mod common;

use docshard_coordinator::CoordinatorClient;
use docshard_core::Key;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn insert_commit_release_and_reload_round_trips() {
    let (backend, coordinator) = common::shared_fixtures();
    let shard = common::shard_with(common::config("s1"), backend, coordinator.clone());
    shard.start().await.unwrap();

    let key = Key::new("user:1");
    shard.lock("c1", &key).await.unwrap();
    let doc = json!({"_id": "1", "name": "rain", "age": 30});
    shard.insert("c1", &key, doc.clone()).await.unwrap();
    shard.commit("c1", &key).await.unwrap();

    assert!(shard.is_loaded(&key).await);

    coordinator.request_release(&key).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!shard.is_loaded(&key).await);

    let found = shard.find("c1", &key, None).await.unwrap();
    assert_eq!(found, Some(doc));

    shard.stop().await.unwrap();
}

#[tokio::test]
async fn commit_and_rollback_are_idempotent_once_owner_free() {
    let shard = common::standalone_shard("s1").await;
    let key = Key::new("user:1");

    shard.lock("c1", &key).await.unwrap();
    shard
        .insert("c1", &key, json!({"_id": "1", "age": 30}))
        .await
        .unwrap();
    shard.commit("c1", &key).await.unwrap();
    // Second commit on an already owner-free slot is a no-op success, not
    // a contract violation.
    shard.commit("c1", &key).await.unwrap();
    shard.rollback("c1", &key).await.unwrap();
    assert_eq!(
        shard.find("c1", &key, Some("age")).await.unwrap(),
        Some(json!(30))
    );

    shard.stop().await.unwrap();
}

#[tokio::test]
async fn del_on_absent_key_is_success() {
    let shard = common::standalone_shard("s1").await;
    let key = Key::new("user:missing");
    shard.lock("c1", &key).await.unwrap();
    assert!(shard.remove("c1", &key).await.is_ok());
    shard.commit("c1", &key).await.unwrap();
    shard.stop().await.unwrap();
}

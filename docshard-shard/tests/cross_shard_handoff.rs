mod common;

use docshard_core::Key;
use serde_json::json;
use std::time::Duration;

/// S1 locks K and inserts D; S2's `find` blocks until S1 commits and
/// releases, then observes D.
#[tokio::test]
async fn peer_find_unblocks_after_owner_commits() {
    let (backend, coordinator) = common::shared_fixtures();
    let s1 = common::shard_with(common::config("s1"), backend.clone(), coordinator.clone());
    let s2 = common::shard_with(common::config("s2"), backend, coordinator);
    s1.start().await.unwrap();
    s2.start().await.unwrap();

    let key = Key::new("user:1");
    let doc = json!({"_id": "1", "name": "rain"});

    s1.lock("c1", &key).await.unwrap();
    s1.insert("c1", &key, doc.clone()).await.unwrap();

    let s2_for_task = s2.clone();
    let key_for_task = key.clone();
    let find_task = tokio::spawn(async move { s2_for_task.find("c2", &key_for_task, None).await });

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!find_task.is_finished());

    s1.commit("c1", &key).await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(2), find_task)
        .await
        .expect("s2's find did not unblock in time")
        .unwrap()
        .unwrap();
    assert_eq!(result, Some(doc));

    s1.stop().await.unwrap();
    s2.stop().await.unwrap();
}

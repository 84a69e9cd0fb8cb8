mod common;

use docshard_core::Key;
use std::time::Duration;

#[tokio::test]
async fn same_connection_reacquires_without_deadlock_other_connection_blocks() {
    let shard = common::standalone_shard("s1").await;
    let key = Key::new("user:1");

    shard.lock("c1", &key).await.unwrap();
    tokio::time::timeout(Duration::from_millis(100), shard.lock("c1", &key))
        .await
        .expect("re-entrant lock must not deadlock")
        .unwrap();

    let shard_for_task = shard.clone();
    let key_for_task = key.clone();
    let other_lock = tokio::spawn(async move { shard_for_task.lock("c2", &key_for_task).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(
        !other_lock.is_finished(),
        "a concurrent lock from another connection must block while c1 holds it"
    );

    shard.commit("c1", &key).await.unwrap();

    tokio::time::timeout(Duration::from_secs(1), other_lock)
        .await
        .expect("c2's lock should unblock after c1 commits")
        .unwrap()
        .unwrap();

    shard.stop().await.unwrap();
}

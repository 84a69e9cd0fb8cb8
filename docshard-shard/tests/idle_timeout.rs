mod common;

use docshard_core::Key;
use std::time::Duration;

#[tokio::test]
async fn idle_loaded_slot_unloads_without_caller_action() {
    let (backend, coordinator) = common::shared_fixtures();
    let mut config = common::config("s1");
    config.doc_idle_timeout = Duration::from_millis(100);
    config.persist_interval = Duration::from_millis(20);
    let shard = common::shard_with(config, backend, coordinator);
    shard.start().await.unwrap();

    let key = Key::new("user:1");
    shard.find("c1", &key, None).await.unwrap();
    assert!(shard.is_loaded(&key).await);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!shard.is_loaded(&key).await);

    shard.stop().await.unwrap();
}

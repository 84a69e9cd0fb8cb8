mod common;

use docshard_core::Key;
use serde_json::json;

#[tokio::test]
async fn rollback_restores_value_observed_at_start_of_hold() {
    let shard = common::standalone_shard("s1").await;
    let key = Key::new("user:1");

    shard.lock("c1", &key).await.unwrap();
    shard
        .insert("c1", &key, json!({"_id": "1", "age": 30}))
        .await
        .unwrap();
    shard.commit("c1", &key).await.unwrap();

    shard.lock("c1", &key).await.unwrap();
    shard.update("c1", &key, json!({"age": 31})).await.unwrap();
    assert_eq!(
        shard.find("c1", &key, Some("age")).await.unwrap(),
        Some(json!(31))
    );

    shard.rollback("c1", &key).await.unwrap();
    assert_eq!(
        shard.find("c1", &key, Some("age")).await.unwrap(),
        Some(json!(30))
    );

    shard.stop().await.unwrap();
}

#[tokio::test]
async fn rollback_without_prior_mutation_is_a_no_op() {
    let shard = common::standalone_shard("s1").await;
    let key = Key::new("user:1");

    shard.lock("c1", &key).await.unwrap();
    shard
        .insert("c1", &key, json!({"_id": "1", "age": 30}))
        .await
        .unwrap();
    shard.commit("c1", &key).await.unwrap();

    shard.lock("c1", &key).await.unwrap();
    shard.rollback("c1", &key).await.unwrap();
    assert_eq!(
        shard.find("c1", &key, None).await.unwrap(),
        Some(json!({"_id": "1", "age": 30}))
    );

    shard.stop().await.unwrap();
}

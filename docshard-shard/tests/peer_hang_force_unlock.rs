mod common;

use docshard_core::{DocShardError, Key};
use serde_json::json;
use std::time::Duration;

/// S1 locks K and stalls (never commits). S2's `find` waits out
/// `auto_unlock_timeout`, force-unlocks, and loads K itself (observing
/// nothing, since S1 never wrote). S1's own background lock renewal (or,
/// if it loses the race, a later `commit`+save-all reconciliation) then
/// discovers the theft and reports `LockLost` for K on the errors feed,
/// evicting the stale slot — whichever path gets there first, the outcome
/// is the same, so the test doesn't pin the exact path.
#[tokio::test]
async fn peer_hang_is_force_unlocked_and_owner_reports_lock_lost() {
    let (backend, coordinator) = common::shared_fixtures();

    let mut s1_config = common::config("s1");
    s1_config.auto_unlock_timeout = Duration::from_millis(80);
    let mut s2_config = common::config("s2");
    s2_config.auto_unlock_timeout = Duration::from_millis(80);

    let s1 = common::shard_with(s1_config, backend.clone(), coordinator.clone());
    let s2 = common::shard_with(s2_config, backend, coordinator);
    let mut s1_errors = s1.errors();
    s1.start().await.unwrap();
    s2.start().await.unwrap();

    let key = Key::new("user:1");
    s1.lock("c1", &key).await.unwrap();
    s1.insert("c1", &key, json!({"_id": "1"})).await.unwrap();
    // S1 stalls here: no commit, simulating a hung connection.

    let result = tokio::time::timeout(Duration::from_secs(2), s2.find("c2", &key, None))
        .await
        .expect("s2's find should eventually complete via force-unlock")
        .unwrap();
    assert_eq!(result, None, "S1 never wrote, so the backend has nothing for K");

    let reported = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match s1_errors.recv().await {
                Ok(DocShardError::LockLost { keys }) if keys == vec![key.clone()] => return true,
                Ok(_) => continue,
                Err(_) => return false,
            }
        }
    })
    .await
    .unwrap_or(false);
    assert!(reported, "S1 should report LockLost for the stolen key");

    tokio::time::timeout(Duration::from_secs(1), async {
        while s1.is_loaded(&key).await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("S1's stale slot should eventually be evicted");

    s1.stop().await.unwrap();
    s2.stop().await.unwrap();
}

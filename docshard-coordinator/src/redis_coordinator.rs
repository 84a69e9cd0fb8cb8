use async_trait::async_trait;
use docshard_core::Key;
use redis::AsyncCommands;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{CoordinatorClient, CoordinatorError, LockOutcome, ReleaseSubscription};

/// Atomic compare-and-delete: removes `ownerLock[key]` only if it still
/// equals `owner_id`. Mirrors the classic Redis distributed-lock unlock
/// script (a plain `DEL` would risk deleting a lock a different owner
/// acquired after this one's TTL expired).
const UNLOCK_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Same compare check, but extends the TTL instead of deleting.
const RENEW_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("pexpire", KEYS[1], ARGV[2])
else
    return 0
end
"#;

fn lock_key(key: &Key) -> String {
    format!("ownerLock:{key}")
}

fn channel_name(key: &Key) -> String {
    format!("request:{key}")
}

/// Coordinator driver backed by a real Redis-compatible service.
///
/// Locks are `SET NX PX` entries; unlock and renew are compare-and-set Lua
/// scripts so a shard can never release or extend a lock it no longer
/// holds. Release requests are plain pub/sub messages on `request:<key>`.
pub struct RedisCoordinator {
    manager: redis::aio::ConnectionManager,
    client: redis::Client,
}

impl RedisCoordinator {
    pub async fn new(url: &str) -> Result<Self, CoordinatorError> {
        let client = redis::Client::open(url)
            .map_err(|e| CoordinatorError::Unavailable(e.to_string()))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| CoordinatorError::Unavailable(e.to_string()))?;
        Ok(Self { manager, client })
    }
}

#[async_trait]
impl CoordinatorClient for RedisCoordinator {
    async fn lock(
        &self,
        key: &Key,
        owner_id: &str,
        ttl: Duration,
    ) -> Result<LockOutcome, CoordinatorError> {
        let mut conn = self.manager.clone();
        let acquired: bool = redis::cmd("SET")
            .arg(lock_key(key))
            .arg(owner_id)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(|e| CoordinatorError::Unavailable(e.to_string()))?;
        if acquired {
            return Ok(LockOutcome::Acquired);
        }
        let holder: Option<String> = conn
            .get(lock_key(key))
            .await
            .map_err(|e| CoordinatorError::Unavailable(e.to_string()))?;
        Ok(LockOutcome::Contended {
            holder: holder.unwrap_or_else(|| "unknown".to_string()),
        })
    }

    async fn unlock(&self, key: &Key, owner_id: &str) -> Result<(), CoordinatorError> {
        let mut conn = self.manager.clone();
        let deleted: i64 = redis::Script::new(UNLOCK_SCRIPT)
            .key(lock_key(key))
            .arg(owner_id)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| CoordinatorError::Unavailable(e.to_string()))?;
        if deleted == 1 {
            Ok(())
        } else {
            Err(CoordinatorError::NotHolder { key: key.clone() })
        }
    }

    async fn renew(&self, key: &Key, owner_id: &str, ttl: Duration) -> Result<(), CoordinatorError> {
        let mut conn = self.manager.clone();
        let renewed: i64 = redis::Script::new(RENEW_SCRIPT)
            .key(lock_key(key))
            .arg(owner_id)
            .arg(ttl.as_millis() as u64)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| CoordinatorError::Unavailable(e.to_string()))?;
        if renewed == 1 {
            Ok(())
        } else {
            Err(CoordinatorError::NotHolder { key: key.clone() })
        }
    }

    async fn request_release(&self, key: &Key) -> Result<(), CoordinatorError> {
        let mut conn = self.manager.clone();
        let _: i64 = conn
            .publish(channel_name(key), "release")
            .await
            .map_err(|e| CoordinatorError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn subscribe(&self, prefix: &str) -> Result<ReleaseSubscription, CoordinatorError> {
        let pattern = format!("{prefix}*");
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| CoordinatorError::Unavailable(e.to_string()))?;
        pubsub
            .psubscribe(&pattern)
            .await
            .map_err(|e| CoordinatorError::Unavailable(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            use futures::StreamExt;
            let mut stream = pubsub.into_on_message();
            while let Some(msg) = stream.next().await {
                let channel: String = msg.get_channel_name().to_string();
                let Some(raw_key) = channel.strip_prefix("request:") else {
                    continue;
                };
                if tx.send(Key::new(raw_key.to_string())).is_err() {
                    break;
                }
            }
            debug!("redis release-request subscription ended");
        });

        Ok(ReleaseSubscription { receiver: rx })
    }

    async fn force_unlock(&self, key: &Key) -> Result<(), CoordinatorError> {
        let mut conn = self.manager.clone();
        let _: i64 = conn
            .del(lock_key(key))
            .await
            .map_err(|e| CoordinatorError::Unavailable(e.to_string()))?;
        warn!(%key, "force-unlocked coordinator lock");
        Ok(())
    }
}

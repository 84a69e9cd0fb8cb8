use async_trait::async_trait;
use dashmap::DashMap;
use docshard_core::Key;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::{CoordinatorClient, CoordinatorError, LockOutcome, ReleaseSubscription};

struct LockEntry {
    owner: String,
    expires_at: Instant,
}

/// In-process coordinator, used by tests and single-shard demos.
///
/// Locks live in a `DashMap` keyed by the raw key string, with expiry
/// checked lazily (no background reaper): an entry past its `expires_at`
/// is treated as absent by the next `lock`/`unlock`/`renew` call, which
/// mirrors how a real TTL store behaves from the caller's point of view.
/// Release requests fan out over a `tokio::sync::broadcast` channel.
pub struct LocalCoordinator {
    locks: DashMap<String, LockEntry>,
    requests: broadcast::Sender<String>,
}

impl LocalCoordinator {
    pub fn new() -> Self {
        let (requests, _) = broadcast::channel(1024);
        Self {
            locks: DashMap::new(),
            requests,
        }
    }
}

impl Default for LocalCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CoordinatorClient for LocalCoordinator {
    async fn lock(
        &self,
        key: &Key,
        owner_id: &str,
        ttl: Duration,
    ) -> Result<LockOutcome, CoordinatorError> {
        let now = Instant::now();
        let mut contended = None;
        self.locks
            .entry(key.as_str().to_string())
            .and_modify(|entry| {
                if entry.expires_at <= now {
                    entry.owner = owner_id.to_string();
                    entry.expires_at = now + ttl;
                } else if entry.owner != owner_id {
                    contended = Some(entry.owner.clone());
                } else {
                    entry.expires_at = now + ttl;
                }
            })
            .or_insert_with(|| LockEntry {
                owner: owner_id.to_string(),
                expires_at: now + ttl,
            });
        match contended {
            Some(holder) => Ok(LockOutcome::Contended { holder }),
            None => Ok(LockOutcome::Acquired),
        }
    }

    async fn unlock(&self, key: &Key, owner_id: &str) -> Result<(), CoordinatorError> {
        let removed = self
            .locks
            .remove_if(key.as_str(), |_, entry| entry.owner == owner_id);
        if removed.is_some() {
            Ok(())
        } else if self.locks.contains_key(key.as_str()) {
            Err(CoordinatorError::NotHolder { key: key.clone() })
        } else {
            Ok(())
        }
    }

    async fn renew(&self, key: &Key, owner_id: &str, ttl: Duration) -> Result<(), CoordinatorError> {
        let now = Instant::now();
        match self.locks.get_mut(key.as_str()) {
            Some(mut entry) if entry.owner == owner_id && entry.expires_at > now => {
                entry.expires_at = now + ttl;
                Ok(())
            }
            _ => Err(CoordinatorError::NotHolder { key: key.clone() }),
        }
    }

    async fn request_release(&self, key: &Key) -> Result<(), CoordinatorError> {
        let channel = format!("request:{key}");
        debug!(%channel, "publishing release request");
        let _ = self.requests.send(channel);
        Ok(())
    }

    async fn subscribe(&self, prefix: &str) -> Result<ReleaseSubscription, CoordinatorError> {
        let mut broadcast_rx = self.requests.subscribe();
        let (tx, rx) = mpsc::unbounded_channel();
        let prefix = prefix.to_string();
        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(channel) => {
                        if let Some(raw_key) = channel.strip_prefix(&prefix) {
                            if tx.send(Key::new(raw_key.to_string())).is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(ReleaseSubscription { receiver: rx })
    }

    async fn force_unlock(&self, key: &Key) -> Result<(), CoordinatorError> {
        self.locks.remove(key.as_str());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_lock_contends_until_unlocked() {
        let coord = LocalCoordinator::new();
        let key = Key::new("user:1");
        assert_eq!(
            coord.lock(&key, "a", Duration::from_secs(30)).await.unwrap(),
            LockOutcome::Acquired
        );
        assert!(matches!(
            coord.lock(&key, "b", Duration::from_secs(30)).await.unwrap(),
            LockOutcome::Contended { .. }
        ));
        coord.unlock(&key, "a").await.unwrap();
        assert_eq!(
            coord.lock(&key, "b", Duration::from_secs(30)).await.unwrap(),
            LockOutcome::Acquired
        );
    }

    #[tokio::test]
    async fn unlock_by_non_holder_fails() {
        let coord = LocalCoordinator::new();
        let key = Key::new("user:1");
        coord.lock(&key, "a", Duration::from_secs(30)).await.unwrap();
        assert!(coord.unlock(&key, "b").await.is_err());
    }

    #[tokio::test]
    async fn expired_lock_is_reacquirable() {
        let coord = LocalCoordinator::new();
        let key = Key::new("user:1");
        coord.lock(&key, "a", Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(
            coord.lock(&key, "b", Duration::from_secs(30)).await.unwrap(),
            LockOutcome::Acquired
        );
    }

    #[tokio::test]
    async fn subscribe_receives_matching_request() {
        let coord = LocalCoordinator::new();
        let mut sub = coord.subscribe("request:").await.unwrap();
        coord.request_release(&Key::new("user:1")).await.unwrap();
        let received = sub.receiver.recv().await.unwrap();
        assert_eq!(received.as_str(), "user:1");
    }
}

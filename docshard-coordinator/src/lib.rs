//! Coordination service client for docshard, per spec §4.2.
//!
//! The lifecycle manager never talks to the coordination service directly;
//! it goes through this trait, which names the six primitives a shard needs
//! to own a key across a fleet: `lock`, `unlock`, `renew`, `request_release`,
//! `subscribe`, `force_unlock`. Two drivers are provided: `LocalCoordinator`,
//! an in-process stand-in for tests and single-shard demos, and
//! `RedisCoordinator`, which maps the same primitives onto `SET NX PX`,
//! a compare-and-delete Lua script, and pub/sub.

mod error;
mod local;
mod redis_coordinator;

pub use error::CoordinatorError;
pub use local::LocalCoordinator;
pub use redis_coordinator::RedisCoordinator;

use async_trait::async_trait;
use docshard_core::Key;
use std::time::Duration;
use tokio::sync::mpsc;

/// Outcome of a `lock` attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    /// The caller now holds the lock.
    Acquired,
    /// Another owner already holds the lock.
    Contended { holder: String },
}

/// A live subscription to release-request notifications on a key prefix.
///
/// Spec §4.2 describes `subscribe(prefix, handler)` delivering publishes to
/// a handler; this is expressed as a channel receiver instead of a callback,
/// since that is the idiomatic way to consume an event stream in async Rust.
pub struct ReleaseSubscription {
    pub receiver: mpsc::UnboundedReceiver<Key>,
}

/// Coordination service operations a shard needs to own keys across a fleet.
///
/// `ttl` is always the shard's `autoUnlockTimeout`. Expiry of a lock without
/// an explicit `unlock` is a fault: the owner is presumed hung and must be
/// recovered via `force_unlock` by whichever peer notices first.
#[async_trait]
pub trait CoordinatorClient: Send + Sync {
    /// Atomic "set if absent" of the lock on `key`, held by `owner_id` for `ttl`.
    async fn lock(
        &self,
        key: &Key,
        owner_id: &str,
        ttl: Duration,
    ) -> Result<LockOutcome, CoordinatorError>;

    /// Atomic compare-and-delete: succeeds only if `owner_id` is still the holder.
    async fn unlock(&self, key: &Key, owner_id: &str) -> Result<(), CoordinatorError>;

    /// Extends the lock's expiry iff still held by `owner_id`.
    async fn renew(&self, key: &Key, owner_id: &str, ttl: Duration) -> Result<(), CoordinatorError>;

    /// Publishes a release request on `request:<key>`.
    async fn request_release(&self, key: &Key) -> Result<(), CoordinatorError>;

    /// Subscribes to release requests for every key starting with `prefix`.
    async fn subscribe(&self, prefix: &str) -> Result<ReleaseSubscription, CoordinatorError>;

    /// Unconditional delete of the lock on `key`, used by a peer that has
    /// decided the current holder is hung.
    async fn force_unlock(&self, key: &Key) -> Result<(), CoordinatorError>;
}

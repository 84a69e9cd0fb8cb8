//! Backend store adapter for docshard, per spec §4.1 / §6.
//!
//! The core treats the durable document store as a uniform
//! `{start, stop, get, set, del, drop}` interface over `(collection, id)`
//! pairs. This crate provides that trait plus two drivers: an in-process
//! `MemoryBackend` for tests and single-process demos, and a persistent
//! `SledBackend` for real deployments.

mod error;
mod memory;
mod sled_backend;

pub use error::BackendError;
pub use memory::MemoryBackend;
pub use sled_backend::SledBackend;

use async_trait::async_trait;
use docshard_core::Document;

/// Uniform store interface every backend driver must implement.
///
/// All operations are asynchronous and may fail with a transient I/O error
/// (`BackendError::Unavailable`). `get` returns `None` (distinct from an
/// empty document) when the key has never been written or has been
/// deleted. `set` overwrites; `del` on an absent key is success. `drop` is
/// used only by the test harness.
#[async_trait]
pub trait BackendStore: Send + Sync {
    async fn start(&self) -> Result<(), BackendError>;
    async fn stop(&self) -> Result<(), BackendError>;
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, BackendError>;
    async fn set(&self, collection: &str, id: &str, doc: &Document) -> Result<(), BackendError>;
    async fn del(&self, collection: &str, id: &str) -> Result<(), BackendError>;
    async fn drop_collection(&self, collection: &str) -> Result<(), BackendError>;
}

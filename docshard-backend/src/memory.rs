use async_trait::async_trait;
use dashmap::DashMap;
use docshard_core::Document;
use tracing::debug;

use crate::{BackendError, BackendStore};

/// In-process backend store, used by tests and single-process demos.
///
/// Grounded on `aerolithdb-storage::backends::MemoryCache`: a concurrent map
/// keyed by `"collection:id"`, with no persistence across process restarts.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: DashMap<String, Document>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(collection: &str, id: &str) -> String {
        format!("{collection}:{id}")
    }
}

#[async_trait]
impl BackendStore for MemoryBackend {
    async fn start(&self) -> Result<(), BackendError> {
        debug!("starting memory backend");
        Ok(())
    }

    async fn stop(&self) -> Result<(), BackendError> {
        debug!("stopping memory backend");
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, BackendError> {
        let key = Self::key(collection, id);
        Ok(self.data.get(&key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, collection: &str, id: &str, doc: &Document) -> Result<(), BackendError> {
        let key = Self::key(collection, id);
        self.data.insert(key, doc.clone());
        Ok(())
    }

    async fn del(&self, collection: &str, id: &str) -> Result<(), BackendError> {
        let key = Self::key(collection, id);
        self.data.remove(&key);
        Ok(())
    }

    async fn drop_collection(&self, collection: &str) -> Result<(), BackendError> {
        let prefix = format!("{collection}:");
        self.data.retain(|k, _| !k.starts_with(&prefix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let backend = MemoryBackend::new();
        let doc = json!({"name": "rain"});
        backend.set("user", "1", &doc).await.unwrap();
        assert_eq!(backend.get("user", "1").await.unwrap(), Some(doc));
    }

    #[tokio::test]
    async fn get_on_missing_key_is_none() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get("user", "missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn del_on_absent_is_success() {
        let backend = MemoryBackend::new();
        assert!(backend.del("user", "missing").await.is_ok());
    }

    #[tokio::test]
    async fn set_then_del_returns_none() {
        let backend = MemoryBackend::new();
        backend.set("user", "1", &json!({"a": 1})).await.unwrap();
        backend.del("user", "1").await.unwrap();
        assert_eq!(backend.get("user", "1").await.unwrap(), None);
    }
}

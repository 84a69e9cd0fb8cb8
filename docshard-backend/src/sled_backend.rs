use async_trait::async_trait;
use docshard_core::Document;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{BackendError, BackendStore};

/// Persistent backend store backed by an embedded `sled` database.
///
/// Grounded on `aerolithdb-storage::backends::LocalSSDCache` /
/// `DistributedStorage`: a single `sled::Db` opened under a data directory,
/// with documents addressed by a `"collection:id"` byte key and encoded as
/// JSON.
pub struct SledBackend {
    data_dir: PathBuf,
    db: Arc<sled::Db>,
}

impl SledBackend {
    pub async fn new(data_dir: impl AsRef<Path>) -> Result<Self, BackendError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        info!("opening sled backend at {:?}", data_dir);
        tokio::fs::create_dir_all(&data_dir).await?;
        let path = data_dir.clone();
        let db = tokio::task::spawn_blocking(move || sled::open(path))
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        Ok(Self {
            data_dir,
            db: Arc::new(db),
        })
    }

    fn key(collection: &str, id: &str) -> Vec<u8> {
        format!("{collection}:{id}").into_bytes()
    }
}

#[async_trait]
impl BackendStore for SledBackend {
    async fn start(&self) -> Result<(), BackendError> {
        debug!("starting sled backend at {:?}", self.data_dir);
        Ok(())
    }

    async fn stop(&self) -> Result<(), BackendError> {
        debug!("stopping sled backend at {:?}", self.data_dir);
        self.db
            .flush_async()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, BackendError> {
        let key = Self::key(collection, id);
        match self
            .db
            .get(&key)
            .map_err(|e| BackendError::Unavailable(e.to_string()))?
        {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, collection: &str, id: &str, doc: &Document) -> Result<(), BackendError> {
        let key = Self::key(collection, id);
        let bytes = serde_json::to_vec(doc)?;
        self.db
            .insert(key, bytes)
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        self.db
            .flush_async()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn del(&self, collection: &str, id: &str) -> Result<(), BackendError> {
        let key = Self::key(collection, id);
        self.db
            .remove(key)
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn drop_collection(&self, collection: &str) -> Result<(), BackendError> {
        let prefix = format!("{collection}:");
        let keys: Vec<_> = self
            .db
            .scan_prefix(prefix.as_bytes())
            .keys()
            .filter_map(Result::ok)
            .collect();
        for key in keys {
            self.db
                .remove(key)
                .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SledBackend::new(dir.path()).await.unwrap();
        let doc = json!({"name": "rain"});
        backend.set("user", "1", &doc).await.unwrap();
        assert_eq!(backend.get("user", "1").await.unwrap(), Some(doc));
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let backend = SledBackend::new(dir.path()).await.unwrap();
            backend.set("user", "1", &json!({"a": 1})).await.unwrap();
            backend.stop().await.unwrap();
        }
        let backend = SledBackend::new(dir.path()).await.unwrap();
        assert_eq!(backend.get("user", "1").await.unwrap(), Some(json!({"a": 1})));
    }
}

use docshard_backend::{BackendStore, MemoryBackend};
use docshard_coordinator::{CoordinatorClient, LocalCoordinator};
use docshard_core::{BackendKind, CoordinatorKind, ShardConfig};
use docshard_shard::ShardHandle;
use std::sync::Arc;
use std::time::Duration;

#[allow(dead_code)]
pub fn config(shard_id: &str) -> ShardConfig {
    ShardConfig {
        shard_id: shard_id.to_string(),
        backend: BackendKind::Memory,
        backend_config: String::new(),
        coordinator: CoordinatorKind::Local,
        coord_config: String::new(),
        unload_delay: Duration::from_millis(0),
        doc_idle_timeout: Duration::from_secs(3600),
        auto_unlock_timeout: Duration::from_secs(30),
        persist_interval: Duration::from_millis(20),
    }
}

#[allow(dead_code)]
pub fn shared_fixtures() -> (Arc<dyn BackendStore>, Arc<dyn CoordinatorClient>) {
    (Arc::new(MemoryBackend::new()), Arc::new(LocalCoordinator::new()))
}

#[allow(dead_code)]
pub fn shard_with(
    config: ShardConfig,
    backend: Arc<dyn BackendStore>,
    coordinator: Arc<dyn CoordinatorClient>,
) -> ShardHandle {
    ShardHandle::new(config, backend, coordinator)
}

#[allow(dead_code)]
pub async fn standalone_shard(shard_id: &str) -> ShardHandle {
    let (backend, coordinator) = shared_fixtures();
    let shard = shard_with(config(shard_id), backend, coordinator);
    shard.start().await.unwrap();
    shard
}

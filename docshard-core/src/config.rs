//! Shard configuration, per spec §6's configuration table.
//!
//! Loading follows a "file, else generate and save a default" pattern,
//! scoped down to this crate's options.

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_unload_delay() -> Duration {
    Duration::from_millis(0)
}

fn default_doc_idle_timeout() -> Duration {
    Duration::from_secs(u64::MAX / 2)
}

fn default_auto_unlock_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_persist_interval() -> Duration {
    Duration::from_millis(200)
}

/// Which backend driver to use for a shard, selected at configuration time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Memory,
    Sled,
}

/// Which coordinator driver to use for a shard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorKind {
    Local,
    Redis,
}

/// Recognized shard configuration options, per spec §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardConfig {
    /// Identity `S` used in coordinator locks.
    pub shard_id: String,

    /// Backend driver selector.
    pub backend: BackendKind,

    /// Passed opaque to the backend driver (e.g. a sled data directory).
    pub backend_config: String,

    /// Coordinator driver selector.
    pub coordinator: CoordinatorKind,

    /// Coordination service connection string (e.g. a redis:// URL), passed
    /// opaque to the coordinator driver.
    pub coord_config: String,

    /// Grace period after a release-request before unload begins.
    #[serde(with = "duration_millis")]
    pub unload_delay: Duration,

    /// Idle eviction threshold.
    #[serde(with = "duration_millis")]
    pub doc_idle_timeout: Duration,

    /// Coordinator lock ttl; also the peer's patience before force-unlock.
    #[serde(with = "duration_millis")]
    pub auto_unlock_timeout: Duration,

    /// Background save cadence.
    #[serde(with = "duration_millis")]
    pub persist_interval: Duration,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            shard_id: uuid::Uuid::new_v4().to_string(),
            backend: BackendKind::Memory,
            backend_config: "./data/docshard".to_string(),
            coordinator: CoordinatorKind::Local,
            coord_config: "redis://127.0.0.1/".to_string(),
            unload_delay: default_unload_delay(),
            doc_idle_timeout: default_doc_idle_timeout(),
            auto_unlock_timeout: default_auto_unlock_timeout(),
            persist_interval: default_persist_interval(),
        }
    }
}

impl ShardConfig {
    /// Load configuration from `path`, falling back to a generated default
    /// (which is then written back to `path`) if the file does not exist.
    pub async fn load(path: &str) -> anyhow::Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| anyhow::anyhow!("failed to parse {path}: {e}")),
            Err(_) => {
                let config = Self::default();
                config.save(path).await?;
                Ok(config)
            }
        }
    }

    pub async fn save(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

/// Serializes `Duration` as milliseconds, since humantime-style strings
/// aren't worth a dependency for four fields.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_zero_unload_delay_and_large_idle_timeout() {
        let cfg = ShardConfig::default();
        assert_eq!(cfg.unload_delay, Duration::from_millis(0));
        assert!(cfg.doc_idle_timeout > Duration::from_secs(3600 * 24 * 365));
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = ShardConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ShardConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.shard_id, back.shard_id);
        assert_eq!(cfg.auto_unlock_timeout, back.auto_unlock_timeout);
    }
}

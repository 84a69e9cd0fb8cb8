//! Error kinds produced by the docshard core, per spec §7.

use crate::types::Key;
use thiserror::Error;

/// Top-level error type for all docshard operations.
///
/// Four kinds, matching spec §7:
/// - `ContractViolation` — caller broke a precondition; synchronous, never retried.
/// - `BackendUnavailable` — transient backend I/O failure, already retried internally.
/// - `LockLost` — the coordinator lock expired before a pending write was flushed.
/// - `Shutdown` — the shard is stopping; new public calls fail fast.
#[derive(Error, Debug, Clone)]
pub enum DocShardError {
    #[error("contract violation on {key}: {message}")]
    ContractViolation { key: Key, message: String },

    #[error("backend unavailable for {key}: {message}")]
    BackendUnavailable { key: Key, message: String },

    #[error("lock lost for {} key(s): {}", keys.len(), summarize(keys))]
    LockLost { keys: Vec<Key> },

    #[error("shard is shutting down")]
    Shutdown,
}

fn summarize(keys: &[Key]) -> String {
    keys.iter()
        .map(Key::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

pub type DocShardResult<T> = Result<T, DocShardError>;

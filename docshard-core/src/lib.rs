//! Shared types, configuration, and error kinds for the docshard document cache.
//!
//! This crate has no opinion on how documents are stored or how ownership is
//! coordinated across shards — it only defines the vocabulary that
//! `docshard-backend`, `docshard-coordinator`, and `docshard-shard` share:
//! the document value model, the slot lifecycle states, shard configuration,
//! and the error kinds the system can produce.

mod config;
mod error;
mod types;

pub use config::{BackendKind, CoordinatorKind, ShardConfig};
pub use error::{DocShardError, DocShardResult};
pub use types::{Document, Key, SlotState};

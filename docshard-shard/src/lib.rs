//! Slot table, lifecycle manager, persistence pipeline, and public API for
//! a docshard shard process — the heart of the system (spec §4.2-4.5).
//!
//! A [`ShardHandle`] owns one [`docshard_core::ShardConfig`]'s worth of
//! state: a slot table keyed by [`docshard_core::Key`], a backend driver,
//! and a coordinator client. `start()` spawns the background tasks that
//! keep coordinator locks alive, flush dirty slots, and evict idle ones;
//! the public API methods (`lock`, `find`, `insert`, `update`, `remove`,
//! `commit`, `rollback`) all run through the same per-key serialization
//! point described in spec §5.

mod handle;
mod slot;

pub use handle::ShardHandle;

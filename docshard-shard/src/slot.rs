use docshard_core::{Document, SlotState};
use std::collections::VecDeque;
use std::time::Instant;
use tokio::sync::oneshot;

/// In-memory residency record for one key, per spec §3.
///
/// `doc`/`shadow` are `None` to represent the "absent" sentinel, distinct
/// from an empty document. `shadow_captured` is tracked separately from
/// `shadow.is_some()` because a captured shadow of "absent" (after an
/// `insert`) is itself `None`.
pub(crate) struct Slot {
    pub state: SlotState,
    pub doc: Option<Document>,
    pub shadow: Option<Document>,
    pub shadow_captured: bool,
    pub owner: Option<String>,
    pub dirty: bool,
    /// Set when a commit has happened since the last successful flush; kept
    /// through a subsequent `rollback` so the pipeline still re-flushes the
    /// earlier committed value.
    pub committed_since_flush: bool,
    pub last_touched: Instant,
    pub waiters: VecDeque<oneshot::Sender<()>>,
    pub release_requested: bool,
    pub release_requested_at: Option<Instant>,
}

impl Slot {
    pub fn loading() -> Self {
        Self {
            state: SlotState::Loading,
            doc: None,
            shadow: None,
            shadow_captured: false,
            owner: None,
            dirty: false,
            committed_since_flush: false,
            last_touched: Instant::now(),
            waiters: VecDeque::new(),
            release_requested: false,
            release_requested_at: None,
        }
    }

    pub fn touch(&mut self) {
        self.last_touched = Instant::now();
    }

    pub fn push_waiter(&mut self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.waiters.push_back(tx);
        rx
    }

    pub fn wake_one(&mut self) {
        if let Some(tx) = self.waiters.pop_front() {
            let _ = tx.send(());
        }
    }

    pub fn wake_all(&mut self) {
        for tx in self.waiters.drain(..) {
            let _ = tx.send(());
        }
    }
}

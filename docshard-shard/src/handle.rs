use dashmap::DashMap;
use docshard_backend::BackendStore;
use docshard_coordinator::{CoordinatorClient, CoordinatorError, LockOutcome};
use docshard_core::{Document, DocShardError, DocShardResult, Key, ShardConfig, SlotState};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::slot::Slot;

const ERROR_CHANNEL_CAPACITY: usize = 256;

/// Public entry point into a running shard, per spec §4's public API surface.
///
/// Cheap to clone: internally an `Arc` around the slot table and drivers —
/// clone the `Arc`, hand the clone to a spawned task.
#[derive(Clone)]
pub struct ShardHandle {
    inner: Arc<ShardInner>,
}

struct ShardInner {
    shard_id: String,
    config: ShardConfig,
    backend: Arc<dyn BackendStore>,
    coordinator: Arc<dyn CoordinatorClient>,
    slots: DashMap<Key, Arc<Mutex<Slot>>>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    errors: broadcast::Sender<DocShardError>,
}

impl ShardHandle {
    pub fn new(
        config: ShardConfig,
        backend: Arc<dyn BackendStore>,
        coordinator: Arc<dyn CoordinatorClient>,
    ) -> Self {
        let (errors, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);
        let shard_id = config.shard_id.clone();
        Self {
            inner: Arc::new(ShardInner {
                shard_id,
                config,
                backend,
                coordinator,
                slots: DashMap::new(),
                cancel: CancellationToken::new(),
                tasks: Mutex::new(Vec::new()),
                errors,
            }),
        }
    }

    /// A feed of errors raised by background work (unload failures, lost
    /// locks). Foreground errors from `commit`/`rollback`/`find`/`lock` are
    /// returned directly and never appear here.
    pub fn errors(&self) -> broadcast::Receiver<DocShardError> {
        self.inner.errors.subscribe()
    }

    /// Starts background tasks: lock renewal, the persistence pipeline, the
    /// idle-unload sweep, and the release-request listener.
    pub async fn start(&self) -> DocShardResult<()> {
        info!(shard_id = %self.inner.shard_id, "starting shard");
        self.inner
            .backend
            .start()
            .await
            .map_err(|e| DocShardError::BackendUnavailable {
                key: Key::new("<shard>"),
                message: e.to_string(),
            })?;

        let mut tasks = self.inner.tasks.lock().await;
        tasks.push(self.spawn_renewal_task());
        tasks.push(self.spawn_persistence_task());
        tasks.push(self.spawn_unload_sweep_task());
        tasks.push(self.spawn_release_listener_task().await?);
        Ok(())
    }

    /// Cancels background tasks, waits a bounded grace period for
    /// in-flight holders to commit or roll back, then force-unloads every
    /// remaining resident slot regardless of ownership, flushing dirty
    /// ones and releasing their coordinator locks.
    pub async fn stop(&self) -> DocShardResult<()> {
        info!(shard_id = %self.inner.shard_id, "stopping shard");
        self.inner.cancel.cancel();

        let keys: Vec<Key> = self.inner.slots.iter().map(|e| e.key().clone()).collect();
        let deadline = Instant::now() + self.inner.config.auto_unlock_timeout;
        for key in keys {
            self.inner.drain_and_unload(&key, deadline).await;
        }

        let mut tasks = self.inner.tasks.lock().await;
        for task in tasks.drain(..) {
            let _ = task.await;
        }
        self.inner
            .backend
            .stop()
            .await
            .map_err(|e| DocShardError::BackendUnavailable {
                key: Key::new("<shard>"),
                message: e.to_string(),
            })
    }

    /// Acquires the write lock on `key` for `conn_id`, loading it first if
    /// necessary. Re-entrant: a connection that already holds the lock gets
    /// an immediate success.
    pub async fn lock(&self, conn_id: &str, key: &Key) -> DocShardResult<()> {
        self.check_running()?;
        loop {
            let (slot_arc, is_new) = self.inner.get_or_insert_slot(key);
            if is_new {
                self.inner.load(key, &slot_arc).await?;
                continue;
            }
            let mut guard = slot_arc.lock().await;
            match guard.state {
                SlotState::Loading | SlotState::Unloading => {
                    let rx = guard.push_waiter();
                    drop(guard);
                    self.wait_or_cancelled(rx).await?;
                    continue;
                }
                SlotState::Loaded => match &guard.owner {
                    None => {
                        guard.owner = Some(conn_id.to_string());
                        guard.touch();
                        return Ok(());
                    }
                    Some(owner) if owner == conn_id => {
                        guard.touch();
                        return Ok(());
                    }
                    Some(_) => {
                        let rx = guard.push_waiter();
                        drop(guard);
                        self.wait_or_cancelled(rx).await?;
                        continue;
                    }
                },
                SlotState::Unloaded => continue,
            }
        }
    }

    /// Read path. Triggers a load if the key has no resident slot. Does not
    /// block on `owner`: any connection may read a loaded slot.
    pub async fn find(
        &self,
        _conn_id: &str,
        key: &Key,
        field: Option<&str>,
    ) -> DocShardResult<Option<Document>> {
        self.check_running()?;
        loop {
            let (slot_arc, is_new) = self.inner.get_or_insert_slot(key);
            if is_new {
                self.inner.load(key, &slot_arc).await?;
                continue;
            }
            let mut guard = slot_arc.lock().await;
            match guard.state {
                SlotState::Loading => {
                    let rx = guard.push_waiter();
                    drop(guard);
                    self.wait_or_cancelled(rx).await?;
                    continue;
                }
                SlotState::Unloaded => continue,
                SlotState::Loaded | SlotState::Unloading => {
                    guard.touch();
                    let doc = guard.doc.clone();
                    return Ok(match (doc, field) {
                        (Some(d), Some(f)) => d.get(f).cloned(),
                        (Some(d), None) => Some(d),
                        (None, _) => None,
                    });
                }
            }
        }
    }

    /// Requires `conn_id` to hold `key`'s lock and the slot to be absent.
    pub async fn insert(&self, conn_id: &str, key: &Key, doc: Document) -> DocShardResult<()> {
        self.check_running()?;
        let slot_arc = self.owned_slot(conn_id, key)?;
        let mut guard = slot_arc.lock().await;
        self.require_owner(&guard, conn_id, key)?;
        if guard.doc.is_some() {
            return Err(DocShardError::ContractViolation {
                key: key.clone(),
                message: "insert on a key that already has a document".into(),
            });
        }
        if !guard.shadow_captured {
            guard.shadow = guard.doc.clone();
            guard.shadow_captured = true;
        }
        guard.doc = Some(doc);
        guard.dirty = true;
        guard.touch();
        Ok(())
    }

    /// Requires `conn_id` to hold `key`'s lock and a document to be present.
    /// `patch` is applied as a shallow field merge over the existing document.
    pub async fn update(
        &self,
        conn_id: &str,
        key: &Key,
        patch: Document,
    ) -> DocShardResult<Document> {
        self.check_running()?;
        let slot_arc = self.owned_slot(conn_id, key)?;
        let mut guard = slot_arc.lock().await;
        self.require_owner(&guard, conn_id, key)?;
        let Some(mut current) = guard.doc.clone() else {
            return Err(DocShardError::ContractViolation {
                key: key.clone(),
                message: "update on an absent document".into(),
            });
        };
        if !guard.shadow_captured {
            guard.shadow = Some(current.clone());
            guard.shadow_captured = true;
        }
        merge_fields(&mut current, &patch);
        guard.doc = Some(current.clone());
        guard.dirty = true;
        guard.touch();
        Ok(current)
    }

    /// Requires `conn_id` to hold `key`'s lock.
    pub async fn remove(&self, conn_id: &str, key: &Key) -> DocShardResult<()> {
        self.check_running()?;
        let slot_arc = self.owned_slot(conn_id, key)?;
        let mut guard = slot_arc.lock().await;
        self.require_owner(&guard, conn_id, key)?;
        if !guard.shadow_captured {
            guard.shadow = guard.doc.clone();
            guard.shadow_captured = true;
        }
        guard.doc = None;
        guard.dirty = true;
        guard.touch();
        Ok(())
    }

    /// Ends `conn_id`'s hold on `key`, clearing the shadow and waking one
    /// waiter. Does not write through to the backend; see the persistence
    /// pipeline. Idempotent: calling it again on a slot that's already
    /// owner-free is a no-op success rather than a contract violation.
    pub async fn commit(&self, conn_id: &str, key: &Key) -> DocShardResult<()> {
        self.check_running()?;
        let slot_arc = self.owned_slot(conn_id, key)?;
        let mut guard = slot_arc.lock().await;
        if guard.state == SlotState::Loaded && guard.owner.is_none() {
            return Ok(());
        }
        self.require_owner(&guard, conn_id, key)?;
        guard.shadow = None;
        guard.shadow_captured = false;
        guard.owner = None;
        if guard.dirty {
            guard.committed_since_flush = true;
        }
        guard.wake_one();
        Ok(())
    }

    /// Undoes `conn_id`'s uncommitted mutations, restoring the last
    /// committed value. `dirty` is cleared unless an earlier commit within
    /// this residency still needs flushing. Idempotent on an already
    /// owner-free slot, matching `commit`.
    pub async fn rollback(&self, conn_id: &str, key: &Key) -> DocShardResult<()> {
        self.check_running()?;
        let slot_arc = self.owned_slot(conn_id, key)?;
        let mut guard = slot_arc.lock().await;
        if guard.state == SlotState::Loaded && guard.owner.is_none() {
            return Ok(());
        }
        self.require_owner(&guard, conn_id, key)?;
        if guard.shadow_captured {
            guard.doc = guard.shadow.take();
            guard.shadow_captured = false;
        }
        guard.dirty = guard.committed_since_flush;
        guard.owner = None;
        guard.wake_one();
        Ok(())
    }

    /// Non-suspending check of whether `key` currently has a resident,
    /// fully loaded slot.
    pub async fn is_loaded(&self, key: &Key) -> bool {
        match self.inner.slots.get(key) {
            Some(entry) => {
                let guard = entry.value().lock().await;
                matches!(guard.state, SlotState::Loaded)
            }
            None => false,
        }
    }

    /// Flushes every dirty, unowned slot immediately, bypassing the
    /// persistence pipeline's interval. Used by tests and graceful paths
    /// that want a synchronous save point.
    pub async fn save_all(&self) -> DocShardResult<()> {
        self.inner.save_all().await
    }

    fn owned_slot(&self, conn_id: &str, key: &Key) -> DocShardResult<Arc<Mutex<Slot>>> {
        self.inner
            .slots
            .get(key)
            .map(|e| e.value().clone())
            .ok_or_else(|| DocShardError::ContractViolation {
                key: key.clone(),
                message: format!("{conn_id} does not hold a lock on {key}"),
            })
    }

    fn require_owner(&self, guard: &Slot, conn_id: &str, key: &Key) -> DocShardResult<()> {
        if guard.state != SlotState::Loaded || guard.owner.as_deref() != Some(conn_id) {
            return Err(DocShardError::ContractViolation {
                key: key.clone(),
                message: format!("{conn_id} does not hold the lock on {key}"),
            });
        }
        Ok(())
    }

    fn check_running(&self) -> DocShardResult<()> {
        if self.inner.cancel.is_cancelled() {
            Err(DocShardError::Shutdown)
        } else {
            Ok(())
        }
    }

    async fn wait_or_cancelled(&self, rx: tokio::sync::oneshot::Receiver<()>) -> DocShardResult<()> {
        tokio::select! {
            _ = rx => Ok(()),
            _ = self.inner.cancel.cancelled() => Err(DocShardError::Shutdown),
        }
    }

    fn spawn_renewal_task(&self) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let interval = (inner.config.auto_unlock_timeout / 3).max(Duration::from_millis(10));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => inner.renew_all().await,
                    _ = inner.cancel.cancelled() => break,
                }
            }
        })
    }

    fn spawn_persistence_task(&self) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let interval = inner.config.persist_interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = inner.save_all().await {
                            warn!(error = %e, "persistence pipeline reported errors");
                        }
                    }
                    _ = inner.cancel.cancelled() => break,
                }
            }
        })
    }

    fn spawn_unload_sweep_task(&self) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let interval = inner.config.persist_interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => inner.sweep_idle_slots().await,
                    _ = inner.cancel.cancelled() => break,
                }
            }
        })
    }

    async fn spawn_release_listener_task(&self) -> DocShardResult<JoinHandle<()>> {
        let mut subscription = self
            .inner
            .coordinator
            .subscribe("request:")
            .await
            .map_err(|e| DocShardError::BackendUnavailable {
                key: Key::new("<shard>"),
                message: e.to_string(),
            })?;
        let inner = Arc::clone(&self.inner);
        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    received = subscription.receiver.recv() => {
                        match received {
                            Some(key) => inner.handle_release_request(&key).await,
                            None => break,
                        }
                    }
                    _ = inner.cancel.cancelled() => break,
                }
            }
        }))
    }
}

impl ShardInner {
    fn get_or_insert_slot(&self, key: &Key) -> (Arc<Mutex<Slot>>, bool) {
        let mut is_new = false;
        let entry = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| {
                is_new = true;
                Arc::new(Mutex::new(Slot::loading()))
            });
        (entry.value().clone(), is_new)
    }

    async fn load(&self, key: &Key, slot_arc: &Arc<Mutex<Slot>>) -> DocShardResult<()> {
        match self.try_load(key, slot_arc).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // Leaving a failed load's slot behind would strand every
                // future caller in an unwakeable wait on a `Loading` slot
                // nobody is finishing; drop it so the next attempt starts
                // clean, and wake whoever had already queued behind it.
                self.slots.remove(key);
                let mut guard = slot_arc.lock().await;
                guard.state = SlotState::Unloaded;
                guard.wake_all();
                Err(e)
            }
        }
    }

    async fn try_load(&self, key: &Key, slot_arc: &Arc<Mutex<Slot>>) -> DocShardResult<()> {
        self.acquire_coordinator_lock(key).await?;
        let doc = self
            .backend
            .get(key.collection(), key.id())
            .await
            .map_err(|e| DocShardError::BackendUnavailable {
                key: key.clone(),
                message: e.to_string(),
            })?;

        let mut guard = slot_arc.lock().await;
        guard.state = SlotState::Loaded;
        guard.doc = doc;
        guard.touch();
        guard.wake_all();
        Ok(())
    }

    async fn acquire_coordinator_lock(&self, key: &Key) -> DocShardResult<()> {
        let ttl = self.config.auto_unlock_timeout;
        let deadline = Instant::now() + ttl;
        let mut backoff = Duration::from_millis(10);
        let mut forced = false;
        loop {
            match self.coordinator.lock(key, &self.shard_id, ttl).await {
                Ok(LockOutcome::Acquired) => return Ok(()),
                Ok(LockOutcome::Contended { holder }) => {
                    debug!(%key, %holder, "coordinator lock contended");
                    let _ = self.coordinator.request_release(key).await;
                    if Instant::now() >= deadline {
                        if forced {
                            return Err(DocShardError::BackendUnavailable {
                                key: key.clone(),
                                message: "coordinator lock unavailable after force-unlock".into(),
                            });
                        }
                        warn!(%key, "auto_unlock_timeout elapsed, forcing unlock");
                        self.coordinator.force_unlock(key).await.map_err(|e| {
                            DocShardError::BackendUnavailable {
                                key: key.clone(),
                                message: e.to_string(),
                            }
                        })?;
                        forced = true;
                        continue;
                    }
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_millis(500));
                }
                Err(e) => {
                    return Err(DocShardError::BackendUnavailable {
                        key: key.clone(),
                        message: e.to_string(),
                    })
                }
            }
        }
    }

    async fn write_through(&self, key: &Key, doc: &Option<Document>) -> Result<(), String> {
        match doc {
            Some(d) => self
                .backend
                .set(key.collection(), key.id(), d)
                .await
                .map_err(|e| e.to_string()),
            None => self
                .backend
                .del(key.collection(), key.id())
                .await
                .map_err(|e| e.to_string()),
        }
    }

    /// Shutdown path for one slot: waits up to `deadline` for an in-flight
    /// holder to commit or roll back on its own, then forces the owner off
    /// (discarding uncommitted mutations, as `rollback` would) so `unload`
    /// can proceed unconditionally. Never leaves a slot behind in the
    /// table when `stop()` returns.
    async fn drain_and_unload(&self, key: &Key, deadline: Instant) {
        let Some(slot_arc) = self.slots.get(key).map(|e| e.value().clone()) else {
            return;
        };
        loop {
            let (owner_free, loaded) = {
                let guard = slot_arc.lock().await;
                (guard.owner.is_none(), guard.state == SlotState::Loaded)
            };
            if owner_free || !loaded {
                break;
            }
            if Instant::now() >= deadline {
                warn!(%key, "stop: grace period elapsed, forcing owner off slot");
                let mut guard = slot_arc.lock().await;
                if guard.shadow_captured {
                    guard.doc = guard.shadow.take();
                    guard.shadow_captured = false;
                }
                guard.dirty = guard.committed_since_flush;
                guard.owner = None;
                guard.wake_all();
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.unload(key).await;
    }

    /// Scheduled unload, per spec §4.3.2. No-op if the key isn't resident or
    /// is still owned (unload never begins while `owner != None`).
    async fn unload(&self, key: &Key) {
        let Some(slot_arc) = self.slots.get(key).map(|e| e.value().clone()) else {
            return;
        };

        {
            let mut guard = slot_arc.lock().await;
            if guard.owner.is_some() || guard.state != SlotState::Loaded {
                return;
            }
            guard.state = SlotState::Unloading;
        }

        let (dirty, doc) = {
            let guard = slot_arc.lock().await;
            (guard.dirty, guard.doc.clone())
        };

        if dirty {
            let mut attempt = self.write_through(key, &doc).await;
            let mut backoff = Duration::from_millis(20);
            for _ in 0..3 {
                if attempt.is_ok() {
                    break;
                }
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(Duration::from_millis(200));
                attempt = self.write_through(key, &doc).await;
            }
            if let Err(message) = attempt {
                warn!(%key, message, "unload write-through failed persistently");
                let mut guard = slot_arc.lock().await;
                guard.state = SlotState::Loaded;
                drop(guard);
                let _ = self.errors.send(DocShardError::BackendUnavailable {
                    key: key.clone(),
                    message,
                });
                return;
            }
        }

        match self.coordinator.unlock(key, &self.shard_id).await {
            Ok(()) => {}
            Err(CoordinatorError::NotHolder { .. }) => {
                let _ = self.errors.send(DocShardError::LockLost {
                    keys: vec![key.clone()],
                });
            }
            Err(e) => warn!(%key, error = %e, "failed to release coordinator lock"),
        }

        self.slots.remove(key);
        let mut guard = slot_arc.lock().await;
        guard.state = SlotState::Unloaded;
        guard.wake_all();
    }

    /// The persistence pipeline, per spec §4.5 / §4.4's self-detected path.
    async fn save_all(&self) -> DocShardResult<()> {
        let candidates: Vec<(Key, Arc<Mutex<Slot>>)> = self
            .slots
            .iter()
            .filter_map(|e| {
                let key = e.key().clone();
                let slot_arc = e.value().clone();
                Some((key, slot_arc))
            })
            .collect();

        let mut lost_keys = Vec::new();
        for (key, slot_arc) in candidates {
            let (dirty, owner_free, doc) = {
                let guard = slot_arc.lock().await;
                (guard.dirty, guard.owner.is_none(), guard.doc.clone())
            };
            if !dirty || !owner_free {
                continue;
            }

            match self
                .coordinator
                .renew(&key, &self.shard_id, self.config.auto_unlock_timeout)
                .await
            {
                Ok(()) => {
                    if self.write_through(&key, &doc).await.is_ok() {
                        let mut guard = slot_arc.lock().await;
                        guard.dirty = false;
                        guard.committed_since_flush = false;
                    }
                }
                Err(CoordinatorError::NotHolder { .. }) => {
                    warn!(%key, "lock lost before flush, discarding local mutations");
                    self.evict_stale_slot(&key, &slot_arc).await;
                    lost_keys.push(key);
                }
                Err(e) => warn!(%key, error = %e, "lock renewal failed during save-all"),
            }
        }

        if lost_keys.is_empty() {
            Ok(())
        } else {
            let err = DocShardError::LockLost { keys: lost_keys };
            let _ = self.errors.send(err.clone());
            Err(err)
        }
    }

    /// Keeps every actively held lock alive, independent of dirtiness. A
    /// failed renewal means a peer already stole the lock (per spec §9), so
    /// the slot is force-evicted here rather than waiting for `save_all` —
    /// which only reconciles dirty keys and would otherwise never catch a
    /// clean slot serving stale reads under a lock it no longer holds.
    async fn renew_all(&self) {
        let held: Vec<(Key, Arc<Mutex<Slot>>)> = self
            .slots
            .iter()
            .filter_map(|e| {
                let key = e.key().clone();
                let slot_arc = e.value().clone();
                Some((key, slot_arc))
            })
            .collect();

        let mut lost_keys = Vec::new();
        for (key, slot_arc) in held {
            let owner_taken = {
                let guard = slot_arc.lock().await;
                matches!(guard.state, SlotState::Loaded | SlotState::Unloading)
            };
            if !owner_taken {
                continue;
            }
            if let Err(CoordinatorError::NotHolder { .. }) = self
                .coordinator
                .renew(&key, &self.shard_id, self.config.auto_unlock_timeout)
                .await
            {
                warn!(%key, "lock renewal lost ownership, forcing eviction");
                self.evict_stale_slot(&key, &slot_arc).await;
                lost_keys.push(key);
            }
        }
        if !lost_keys.is_empty() {
            let _ = self.errors.send(DocShardError::LockLost { keys: lost_keys });
        }
    }

    async fn sweep_idle_slots(&self) {
        let now = Instant::now();
        let candidates: Vec<Key> = self
            .slots
            .iter()
            .map(|e| e.key().clone())
            .collect();

        for key in candidates {
            let Some(slot_arc) = self.slots.get(&key).map(|e| e.value().clone()) else {
                continue;
            };
            let should_unload = {
                let guard = slot_arc.lock().await;
                if guard.state != SlotState::Loaded || guard.owner.is_some() {
                    false
                } else if let Some(requested_at) = guard.release_requested_at {
                    now.saturating_duration_since(requested_at) >= self.config.unload_delay
                } else {
                    now.saturating_duration_since(guard.last_touched) >= self.config.doc_idle_timeout
                }
            };
            if should_unload {
                self.unload(&key).await;
            }
        }
    }

    /// Release-request handler, per spec §4.3.3. Only records the request
    /// and starts its clock; `sweep_idle_slots` is the sole trigger that
    /// turns an elapsed `unload_delay` into an actual unload, whether the
    /// slot was already owner-free at request time or becomes so later.
    async fn handle_release_request(&self, key: &Key) {
        let Some(slot_arc) = self.slots.get(key).map(|e| e.value().clone()) else {
            return;
        };
        let mut guard = slot_arc.lock().await;
        guard.release_requested = true;
        guard.release_requested_at = Some(Instant::now());
    }

    /// Forces a slot out of the table after its coordinator lock was
    /// confirmed lost to a peer, independent of `dirty`: a clean `Loaded`
    /// slot whose lock was stolen is just as stale as a dirty one.
    async fn evict_stale_slot(&self, key: &Key, slot_arc: &Arc<Mutex<Slot>>) {
        {
            let mut guard = slot_arc.lock().await;
            guard.state = SlotState::Unloading;
        }
        self.slots.remove(key);
        let mut guard = slot_arc.lock().await;
        guard.state = SlotState::Unloaded;
        guard.wake_all();
    }
}

fn merge_fields(target: &mut Document, patch: &Document) {
    if let (Some(target_obj), Some(patch_obj)) = (target.as_object_mut(), patch.as_object()) {
        for (field, value) in patch_obj {
            target_obj.insert(field.clone(), value.clone());
        }
    } else {
        *target = patch.clone();
    }
}

//! Offline change queue persisted under the `pendingWorkerChanges` key.
//!
//! Entries are kept in insertion (FIFO) order as a JSON array. Every
//! read-modify-write goes through one async mutex so concurrent enqueues from
//! different tasks cannot drop each other's entries.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::storage::{KEY_PENDING_WORKER_CHANGES, KeyValueStore};
use crate::types::PendingChange;

/// Durable FIFO of [`PendingChange`]s.
#[derive(Clone)]
pub struct PendingChangeQueue {
    store: Arc<dyn KeyValueStore>,
    write_lock: Arc<Mutex<()>>,
}

impl PendingChangeQueue {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Append a change. A storage failure here is the one error mutations surface.
    pub async fn enqueue(&self, change: PendingChange) -> SyncResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut changes = self.load().await?;
        tracing::info!(
            "queueing status change {} for worker {} ({} already pending)",
            change.status,
            change.worker_id,
            changes.len()
        );
        changes.push(change);
        self.save(&changes).await
    }

    /// All pending changes, oldest first.
    pub async fn list(&self) -> SyncResult<Vec<PendingChange>> {
        let _guard = self.write_lock.lock().await;
        self.load().await
    }

    pub async fn len(&self) -> SyncResult<usize> {
        Ok(self.list().await?.len())
    }

    pub async fn is_empty(&self) -> SyncResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Drop exactly the entries whose ids are given; the rest keep their order.
    pub async fn remove(&self, ids: &HashSet<Uuid>) -> SyncResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let _guard = self.write_lock.lock().await;
        let mut changes = self.load().await?;
        let before = changes.len();
        changes.retain(|c| !ids.contains(&c.id));
        self.save(&changes).await?;
        Ok(before - changes.len())
    }

    pub async fn clear(&self) -> SyncResult<()> {
        let _guard = self.write_lock.lock().await;
        self.store.remove(KEY_PENDING_WORKER_CHANGES).await
    }

    /// Caller must hold `write_lock`. Entries stored without an `id` get one
    /// here, and the ids are written back so later reads agree on them.
    async fn load(&self) -> SyncResult<Vec<PendingChange>> {
        let Some(raw) = self.store.get(KEY_PENDING_WORKER_CHANGES).await? else {
            return Ok(Vec::new());
        };
        let entries: Vec<Value> = serde_json::from_str(&raw).map_err(corrupt)?;
        let missing_ids = entries.iter().filter(|e| e.get("id").is_none()).count();
        let changes: Vec<PendingChange> =
            serde_json::from_value(Value::Array(entries)).map_err(corrupt)?;

        if missing_ids > 0 {
            tracing::info!("assigning ids to {} stored pending changes", missing_ids);
            self.save(&changes).await?;
        }
        Ok(changes)
    }

    async fn save(&self, changes: &[PendingChange]) -> SyncResult<()> {
        let raw = serde_json::to_string(changes)
            .map_err(|e| SyncError::storage(format!("failed to encode pending changes: {}", e)))?;
        self.store.set(KEY_PENDING_WORKER_CHANGES, &raw).await
    }
}

fn corrupt(e: serde_json::Error) -> SyncError {
    tracing::error!("pending change queue is corrupt: {}", e);
    SyncError::storage(format!("invalid JSON under {}: {}", KEY_PENDING_WORKER_CHANGES, e))
}

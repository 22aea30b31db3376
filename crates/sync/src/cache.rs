//! Local worker cache: the fallback data source pages read when the backend
//! is unreachable, and where optimistic status changes land.

use std::sync::{PoisonError, RwLock};

use workerdesk_core::{FrontendId, WorkerRecord, WorkerStatus};

/// Last fetched worker list, in backend order.
#[derive(Debug, Default)]
pub struct WorkerCache {
    workers: RwLock<Vec<WorkerRecord>>,
}

impl WorkerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot after a successful list call.
    pub fn replace_all(&self, workers: Vec<WorkerRecord>) {
        let mut guard = self.workers.write().unwrap_or_else(PoisonError::into_inner);
        *guard = workers;
    }

    pub fn list(&self) -> Vec<WorkerRecord> {
        self.workers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, id: &FrontendId) -> Option<WorkerRecord> {
        self.workers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|w| &w.id == id)
            .cloned()
    }

    /// Apply a status change locally. Returns `false` when the worker is not cached.
    pub fn apply_status(&self, id: &FrontendId, status: WorkerStatus, religion: &str) -> bool {
        let mut guard = self.workers.write().unwrap_or_else(PoisonError::into_inner);
        match guard.iter_mut().find(|w| &w.id == id) {
            Some(worker) => {
                worker.status = status;
                if !religion.is_empty() {
                    worker.religion = religion.to_string();
                }
                true
            }
            None => false,
        }
    }

    /// Replace one cached record (after a profile edit).
    pub fn upsert(&self, record: WorkerRecord) {
        let mut guard = self.workers.write().unwrap_or_else(PoisonError::into_inner);
        match guard.iter_mut().find(|w| w.id == record.id) {
            Some(existing) => *existing = record,
            None => guard.push(record),
        }
    }

    pub fn remove(&self, id: &FrontendId) -> bool {
        let mut guard = self.workers.write().unwrap_or_else(PoisonError::into_inner);
        let before = guard.len();
        guard.retain(|w| &w.id != id);
        guard.len() != before
    }
}

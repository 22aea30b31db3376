//! Scripted in-process `WorkerApi` for unit tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use workerdesk_core::{BackendId, RawWorker, WorkerStatus};

use crate::client::{UpdatePayload, WorkerApi};
use crate::error::{SyncError, SyncResult};
use crate::storage::KeyValueStore;

pub fn raw(id: Option<&str>, name: &str, phone: &str) -> RawWorker {
    RawWorker {
        id: id.map(str::to_string),
        name: Some(name.to_string()),
        phone: Some(phone.to_string()),
        email: Some(format!("{}@example.com", name.to_lowercase().replace(' ', "."))),
        address: Some("12 MG Road".to_string()),
        service: Some("Cleaning".to_string()),
        availability: Some("Weekdays".to_string()),
        status: Some("pending".to_string()),
        ..RawWorker::default()
    }
}

#[derive(Default)]
pub struct ScriptedApi {
    online: AtomicBool,
    fail_json: AtomicBool,
    fail_query: AtomicBool,
    roster: Mutex<Vec<RawWorker>>,
    rejected: Mutex<HashSet<String>>,

    probe_calls: AtomicUsize,
    list_calls: AtomicUsize,
    pub json_updates: Mutex<Vec<(BackendId, UpdatePayload)>>,
    pub query_updates: Mutex<Vec<(BackendId, WorkerStatus, String)>>,
    pub deletes: Mutex<Vec<BackendId>>,
    attempts: AtomicUsize,
}

impl ScriptedApi {
    pub fn with_roster(roster: Vec<RawWorker>) -> Self {
        let api = Self::default();
        api.online.store(true, Ordering::SeqCst);
        *api.roster.lock().unwrap() = roster;
        api
    }

    pub fn offline() -> Self {
        Self::default()
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn fail_json_updates(&self, fail: bool) {
        self.fail_json.store(fail, Ordering::SeqCst);
    }

    pub fn fail_query_updates(&self, fail: bool) {
        self.fail_query.store(fail, Ordering::SeqCst);
    }

    /// Every update/delete aimed at `backend_id` fails with a 500.
    pub fn reject(&self, backend_id: &str) {
        self.rejected.lock().unwrap().insert(backend_id.to_string());
    }

    pub fn set_roster(&self, roster: Vec<RawWorker>) {
        *self.roster.lock().unwrap() = roster;
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Update and delete requests issued, successful or not.
    pub fn mutation_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> SyncResult<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SyncError::Network("connection refused".to_string()))
        }
    }

    fn check_accepted(&self, backend_id: &BackendId) -> SyncResult<()> {
        if self.rejected.lock().unwrap().contains(backend_id.as_str()) {
            return Err(SyncError::Api(500, format!("worker {} update failed", backend_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl WorkerApi for ScriptedApi {
    async fn probe(&self) -> SyncResult<u16> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Ok(200)
    }

    async fn list_workers(&self) -> SyncResult<Vec<RawWorker>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Ok(self.roster.lock().unwrap().clone())
    }

    async fn update_worker(&self, backend_id: &BackendId, payload: &UpdatePayload) -> SyncResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        self.check_accepted(backend_id)?;
        if self.fail_json.load(Ordering::SeqCst) {
            return Err(SyncError::Api(422, "unprocessable body".to_string()));
        }
        self.json_updates
            .lock()
            .unwrap()
            .push((backend_id.clone(), payload.clone()));
        Ok(())
    }

    async fn update_worker_by_query(
        &self,
        backend_id: &BackendId,
        status: WorkerStatus,
        religion: &str,
    ) -> SyncResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        self.check_accepted(backend_id)?;
        if self.fail_query.load(Ordering::SeqCst) {
            return Err(SyncError::Api(500, "query update failed".to_string()));
        }
        self.query_updates
            .lock()
            .unwrap()
            .push((backend_id.clone(), status, religion.to_string()));
        Ok(())
    }

    async fn delete_worker(&self, backend_id: &BackendId) -> SyncResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        self.check_accepted(backend_id)?;
        self.deletes.lock().unwrap().push(backend_id.clone());
        Ok(())
    }
}

/// Store whose writes always fail.
#[derive(Default)]
pub struct BrokenStore;

#[async_trait]
impl KeyValueStore for BrokenStore {
    async fn get(&self, _key: &str) -> SyncResult<Option<String>> {
        Ok(None)
    }

    async fn set(&self, key: &str, _value: &str) -> SyncResult<()> {
        Err(SyncError::storage(format!("disk full writing {}", key)))
    }

    async fn remove(&self, _key: &str) -> SyncResult<()> {
        Ok(())
    }
}

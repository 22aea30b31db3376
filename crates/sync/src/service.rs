//! Worker sync API consumed by the admin pages.
//!
//! Every identity-dependent call resolves the frontend id first. Status
//! mutations favour availability: when the backend is unreachable or rejects
//! both request encodings, the change is queued durably, applied to the local
//! cache, and reported as [`UpdateOutcome::queued`]. Only a failure to persist
//! that queued change is returned as an error.

use std::collections::HashSet;
use std::sync::Arc;

use workerdesk_core::{BackendId, FrontendId, ProfileUpdate, RawWorker, WorkerRecord, WorkerStatus};

use crate::cache::WorkerCache;
use crate::change_queue::PendingChangeQueue;
use crate::client::{HttpWorkerApi, UpdatePayload, WorkerApi};
use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::identity::{IdentityResolver, IdentityStore, derive_frontend_id, rebuild_tables};
use crate::offline::OfflineState;
use crate::storage::{KeyValueStore, SqliteKvStore};
use crate::types::{
    CriticalIdCheck, MappingSnapshot, MappingSyncReport, OfflineStatus, PendingChange,
    ReplayReport, UpdateOutcome, VerificationReport,
};

pub struct WorkerSyncService {
    api: Arc<dyn WorkerApi>,
    identities: Arc<IdentityStore>,
    resolver: IdentityResolver,
    queue: PendingChangeQueue,
    offline: OfflineState,
    cache: WorkerCache,
}

impl WorkerSyncService {
    pub fn new(api: Arc<dyn WorkerApi>, store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_identities(api, store, Arc::new(IdentityStore::new()))
    }

    pub fn with_identities(
        api: Arc<dyn WorkerApi>,
        store: Arc<dyn KeyValueStore>,
        identities: Arc<IdentityStore>,
    ) -> Self {
        Self {
            resolver: IdentityResolver::new(api.clone(), identities.clone()),
            api,
            identities,
            queue: PendingChangeQueue::new(store.clone()),
            offline: OfflineState::new(store),
            cache: WorkerCache::new(),
        }
    }

    /// HTTP client plus SQLite store, as configured.
    pub async fn connect(config: &SyncConfig) -> SyncResult<Self> {
        let api = Arc::new(HttpWorkerApi::from_config(config)?);
        let store = Arc::new(SqliteKvStore::open(&config.store_path).await?);
        tracing::info!("worker sync using {} (store {:?})", config.api_url, config.store_path);
        Ok(Self::new(api, store))
    }

    pub fn identities(&self) -> &Arc<IdentityStore> {
        &self.identities
    }

    /// `true` only when the short-timeout list request answers 200.
    ///
    /// Failures are recorded in the durable offline flag, never raised.
    pub async fn test_connection(&self) -> bool {
        let failure = match self.api.probe().await {
            Ok(200) => {
                if let Err(e) = self.offline.mark_online().await {
                    tracing::warn!("failed to clear offline flag: {}", e);
                }
                return true;
            }
            Ok(status) => format!("status {}", status),
            Err(e) => e.to_string(),
        };

        tracing::warn!("worker API unreachable: {}", failure);
        if let Err(e) = self.offline.mark_offline().await {
            tracing::warn!("failed to record offline flag: {}", e);
        }
        false
    }

    pub async fn offline_status(&self) -> SyncResult<OfflineStatus> {
        self.offline.status().await
    }

    /// Fetch and canonicalize every worker. Network failures propagate so
    /// callers can fall back to [`Self::cached_workers`].
    pub async fn get_all_workers(&self) -> SyncResult<Vec<WorkerRecord>> {
        let roster = self.api.list_workers().await?;
        let workers: Vec<WorkerRecord> = roster
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                let id = derive_frontend_id(&self.identities, raw, Some(index));
                WorkerRecord::from_raw(raw, id, raw.backend_id())
            })
            .collect();

        tracing::debug!("loaded {} workers", workers.len());
        self.cache.replace_all(workers.clone());
        Ok(workers)
    }

    /// Last fetched workers with local changes applied.
    pub fn cached_workers(&self) -> Vec<WorkerRecord> {
        self.cache.list()
    }

    pub async fn update_worker_status(
        &self,
        id: &FrontendId,
        status: WorkerStatus,
        religion: &str,
    ) -> SyncResult<UpdateOutcome> {
        self.warn_on_unusual_transition(id, status);

        if !self.test_connection().await {
            tracing::warn!("backend offline; queueing status change for {}", id);
            return self
                .queue_change(PendingChange::new(id.clone(), None, status, religion))
                .await;
        }

        let backend_id = self.resolver.resolve(id).await;
        match self.push_status(&backend_id, status, religion).await {
            Ok(()) => {
                tracing::info!("worker {} (backend {}) is now {}", id, backend_id, status);
                self.cache.apply_status(id, status, religion);
                Ok(UpdateOutcome::persisted())
            }
            Err(e) => {
                tracing::warn!(
                    "status update for {} (backend {}) failed: {}; queueing",
                    id,
                    backend_id,
                    e
                );
                self.queue_change(PendingChange::new(
                    id.clone(),
                    Some(backend_id),
                    status,
                    religion,
                ))
                .await
            }
        }
    }

    pub async fn approve_worker(&self, id: &FrontendId, religion: &str) -> SyncResult<UpdateOutcome> {
        self.update_worker_status(id, WorkerStatus::Active, religion).await
    }

    pub async fn reject_worker(&self, id: &FrontendId, religion: &str) -> SyncResult<UpdateOutcome> {
        self.update_worker_status(id, WorkerStatus::Rejected, religion).await
    }

    pub async fn deactivate_worker(&self, id: &FrontendId, religion: &str) -> SyncResult<UpdateOutcome> {
        self.update_worker_status(id, WorkerStatus::Inactive, religion).await
    }

    pub async fn activate_worker(&self, id: &FrontendId, religion: &str) -> SyncResult<UpdateOutcome> {
        self.update_worker_status(id, WorkerStatus::Active, religion).await
    }

    /// Merge `updates` over `current` and send the full record.
    ///
    /// Not queued when the backend is unavailable; the error is returned.
    pub async fn update_worker_profile(
        &self,
        id: &FrontendId,
        updates: &ProfileUpdate,
        current: &WorkerRecord,
    ) -> SyncResult<UpdateOutcome> {
        let merged = updates.apply_to(current);
        if let Some(status) = updates.status {
            self.warn_on_unusual_transition(id, status);
        }

        let backend_id = self.resolver.resolve(id).await;
        let delivery = self
            .send_update(&backend_id, &UpdatePayload::from_record(&merged))
            .await?;

        if delivery == Delivery::StatusOnly && updates.has_contact_fields() {
            tracing::warn!(
                "backend took only status and religion for {} (backend {}); contact fields were not saved",
                id,
                backend_id
            );
            self.cache.apply_status(id, merged.status, &merged.religion);
            return Ok(UpdateOutcome::partial());
        }

        tracing::info!("updated profile of {} (backend {})", id, backend_id);
        self.cache.upsert(merged);
        Ok(UpdateOutcome::persisted())
    }

    /// Delete on the backend, then purge every local mapping for `id`.
    pub async fn delete_worker(&self, id: &FrontendId) -> SyncResult<()> {
        let backend_id = self.resolver.resolve(id).await;
        self.api.delete_worker(&backend_id).await?;

        let purged = self.identities.forget_frontend(id);
        self.cache.remove(id);
        tracing::info!(
            "deleted worker {} (backend {}), purged {} mappings",
            id,
            backend_id,
            purged
        );
        Ok(())
    }

    /// Rebuild both identity tables from the full worker list.
    pub async fn sync_worker_mappings(&self) -> SyncResult<MappingSyncReport> {
        let roster = self.api.list_workers().await?;
        let (tables, report) = rebuild_tables(&self.identities, &roster);
        self.identities.replace(tables);

        tracing::info!(
            "synced id mappings for {} workers ({} pinned to seeds)",
            report.workers,
            report.pinned
        );
        Ok(report)
    }

    /// Replay queued status changes oldest first.
    ///
    /// Exactly the entries that reached the backend are removed. Once a
    /// worker's change fails, its later changes wait too, so a worker never
    /// ends up with an older status replayed over a newer one.
    pub async fn sync_pending_worker_changes(&self) -> SyncResult<ReplayReport> {
        let pending = self.queue.list().await?;
        if pending.is_empty() {
            return Ok(ReplayReport::default());
        }

        if !self.test_connection().await {
            tracing::info!("still offline; {} changes stay queued", pending.len());
            return Ok(ReplayReport {
                success: 0,
                failed: pending.len(),
            });
        }

        let mut report = ReplayReport::default();
        let mut done = HashSet::new();
        let mut blocked: HashSet<FrontendId> = HashSet::new();

        for change in &pending {
            if blocked.contains(&change.worker_id) {
                report.failed += 1;
                continue;
            }

            let backend_id = match &change.backend_id {
                Some(backend_id) => backend_id.clone(),
                None => self.resolver.resolve(&change.worker_id).await,
            };

            match self
                .push_status(&backend_id, change.status, &change.religion)
                .await
            {
                Ok(()) => {
                    done.insert(change.id);
                    report.success += 1;
                    self.cache
                        .apply_status(&change.worker_id, change.status, &change.religion);
                }
                Err(e) => {
                    tracing::warn!(
                        "replay of {} for {} failed: {}",
                        change.status,
                        change.worker_id,
                        e
                    );
                    blocked.insert(change.worker_id.clone());
                    report.failed += 1;
                }
            }
        }

        self.queue.remove(&done).await?;
        tracing::info!(
            "replayed pending changes: {} succeeded, {} failed",
            report.success,
            report.failed
        );
        Ok(report)
    }

    pub async fn pending_changes(&self) -> SyncResult<Vec<PendingChange>> {
        self.queue.list().await
    }

    /// Check that each seed worker still maps to its pinned backend id.
    ///
    /// A cached mapping is reported as-is; otherwise the id is resolved.
    pub async fn verify_critical_worker_ids(&self) -> VerificationReport {
        let mut checks = Vec::new();
        for seed in self.identities.seeds() {
            let frontend_id = seed.frontend_id();
            let actual = match self.identities.backend_for(frontend_id.as_str()) {
                Some(cached) => cached,
                None => self.resolver.resolve(&frontend_id).await,
            };
            let expected = seed.backend_id();
            checks.push(CriticalIdCheck {
                name: seed.name_key.to_string(),
                matches: actual == expected,
                frontend_id,
                expected,
                actual,
            });
        }

        let report = VerificationReport {
            success: checks.iter().all(|c| c.matches),
            checks,
        };
        for mismatch in report.mismatches() {
            tracing::warn!(
                "seed worker {} maps to {} (expected {})",
                mismatch.name,
                mismatch.actual,
                mismatch.expected
            );
        }
        report
    }

    pub fn get_id_mappings(&self) -> MappingSnapshot {
        self.identities.snapshot()
    }

    pub fn set_id_mapping(&self, key: &str, backend_id: BackendId) {
        self.identities.set_mapping(key, backend_id);
    }

    pub fn reset_id_mappings(&self) {
        self.identities.reset();
    }

    async fn queue_change(&self, change: PendingChange) -> SyncResult<UpdateOutcome> {
        let (id, status, religion) = (change.worker_id.clone(), change.status, change.religion.clone());
        self.queue.enqueue(change).await?;
        self.cache.apply_status(&id, status, &religion);
        Ok(UpdateOutcome::queued())
    }

    /// Backfill from the backend's copy of the worker, then send.
    async fn push_status(
        &self,
        backend_id: &BackendId,
        status: WorkerStatus,
        religion: &str,
    ) -> SyncResult<()> {
        let roster = self.api.list_workers().await?;
        let current = find_by_backend_id(&roster, backend_id);
        if current.is_none() {
            tracing::debug!("backend id {} not in worker list; sending without backfill", backend_id);
        }
        let payload = UpdatePayload::status_change(status, religion, current);
        self.send_update(backend_id, &payload).await.map(|_| ())
    }

    /// JSON body first, then the query-parameter encoding.
    async fn send_update(&self, backend_id: &BackendId, payload: &UpdatePayload) -> SyncResult<Delivery> {
        match self.api.update_worker(backend_id, payload).await {
            Ok(()) => Ok(Delivery::Full),
            Err(e) => {
                tracing::debug!(
                    "JSON update of {} failed ({}); retrying with query parameters",
                    backend_id,
                    e
                );
                self.api
                    .update_worker_by_query(backend_id, payload.status, &payload.religion)
                    .await?;
                Ok(Delivery::StatusOnly)
            }
        }
    }

    fn warn_on_unusual_transition(&self, id: &FrontendId, next: WorkerStatus) {
        if let Some(current) = self.cache.get(id) {
            if !current.status.can_transition_to(next) {
                tracing::warn!(
                    "unusual status change for {}: {} -> {}",
                    id,
                    current.status,
                    next
                );
            }
        }
    }
}

/// Which encoding of an update the backend accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Full,
    /// Query parameters: status and religion only.
    StatusOnly,
}

fn find_by_backend_id<'a>(roster: &'a [RawWorker], backend_id: &BackendId) -> Option<&'a RawWorker> {
    roster.iter().enumerate().find_map(|(index, raw)| {
        let id = raw
            .backend_id()
            .unwrap_or_else(|| BackendId::from_position(index));
        (&id == backend_id).then_some(raw)
    })
}

//! Shared types returned by the worker sync API.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use workerdesk_core::{BackendId, FrontendId, WorkerStatus};

/// A status change accepted from an operator but not yet confirmed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChange {
    /// Entry identity; replay removes exactly the entries that succeeded.
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    pub worker_id: FrontendId,
    /// Backend id resolved before the failed attempt, reused on replay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_id: Option<BackendId>,
    pub status: WorkerStatus,
    pub religion: String,
    pub timestamp: DateTime<Utc>,
}

impl PendingChange {
    pub fn new(
        worker_id: FrontendId,
        backend_id: Option<BackendId>,
        status: WorkerStatus,
        religion: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            worker_id,
            backend_id,
            status,
            religion: religion.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Outcome of an operator mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    /// `true` when the backend accepted the whole write; `false` when it was
    /// queued, or when only status and religion reached the backend.
    pub persisted: bool,
}

impl UpdateOutcome {
    pub fn persisted() -> Self {
        Self { persisted: true }
    }

    pub fn queued() -> Self {
        Self { persisted: false }
    }

    pub fn partial() -> Self {
        Self { persisted: false }
    }
}

/// Counts from one replay of the pending-change queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub success: usize,
    pub failed: usize,
}

/// Counts from a full mapping rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingSyncReport {
    pub workers: usize,
    /// Records matched to a seed worker and pinned to its backend id.
    pub pinned: usize,
}

/// Plain snapshot of both identity tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingSnapshot {
    pub phone_to_frontend: BTreeMap<String, FrontendId>,
    pub frontend_to_backend: BTreeMap<String, BackendId>,
}

/// One seed worker checked by [`VerificationReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticalIdCheck {
    pub name: String,
    pub frontend_id: FrontendId,
    pub expected: BackendId,
    pub actual: BackendId,
    pub matches: bool,
}

/// Diagnostic report for the debug panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub success: bool,
    pub checks: Vec<CriticalIdCheck>,
}

impl VerificationReport {
    pub fn mismatches(&self) -> impl Iterator<Item = &CriticalIdCheck> {
        self.checks.iter().filter(|c| !c.matches)
    }
}

/// Durable offline flag as last recorded by the connectivity probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineStatus {
    pub offline: bool,
    pub since: Option<DateTime<Utc>>,
}

/// Work done by the connectivity monitor after the backend came back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectReport {
    pub replay: ReplayReport,
    /// `None` when the mapping rebuild failed.
    pub mappings: Option<MappingSyncReport>,
}

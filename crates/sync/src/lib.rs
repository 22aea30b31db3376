//! `workerdesk-sync`
//!
//! **Responsibility:** worker identity reconciliation and offline-tolerant
//! worker management against the remote worker API.
//!
//! This crate provides:
//! - Stable frontend ids for workers whose backend ids churn
//! - Backend id resolution through an ordered strategy cascade
//! - A durable queue for status changes made while the backend is down
//! - The worker sync API pages call (`WorkerSyncService`)

pub mod cache;
pub mod change_queue;
pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod monitor;
pub mod offline;
pub mod service;
pub mod storage;
pub mod types;

#[cfg(test)]
mod testing;

pub use client::{HttpWorkerApi, UpdatePayload, WorkerApi};
pub use config::{ConfigError, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use identity::{IdentityResolver, IdentityStore};
pub use monitor::ConnectivityMonitor;
pub use service::WorkerSyncService;
pub use storage::{KeyValueStore, MemoryKvStore, SqliteKvStore};
pub use types::{
    MappingSnapshot, MappingSyncReport, PendingChange, ReplayReport, UpdateOutcome,
    VerificationReport,
};

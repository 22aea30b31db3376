//! Background connectivity monitor.
//!
//! Probes the backend every poll interval. When the probe succeeds and either
//! the durable offline flag said "offline" or changes are still queued, the
//! queue is replayed and the identity mappings rebuilt.

use std::sync::Arc;
use std::time::Duration;

use crate::service::WorkerSyncService;
use crate::types::ReconnectReport;

pub struct ConnectivityMonitor {
    service: Arc<WorkerSyncService>,
    interval: Duration,
    shutdown: Arc<tokio::sync::Notify>,
}

impl ConnectivityMonitor {
    pub fn new(service: Arc<WorkerSyncService>, interval: Duration) -> Self {
        Self {
            service,
            interval,
            shutdown: Arc::new(tokio::sync::Notify::new()),
        }
    }

    /// Handle that stops the loop started by [`Self::start`].
    pub fn shutdown_handle(&self) -> Arc<tokio::sync::Notify> {
        self.shutdown.clone()
    }

    /// One probe. Returns a report when connectivity was regained or queued
    /// changes were waiting; `None` when offline or there was nothing to do.
    pub async fn tick(&self) -> Option<ReconnectReport> {
        let was_offline = match self.service.offline_status().await {
            Ok(status) => status.offline,
            Err(e) => {
                tracing::warn!("failed to read offline flag: {}", e);
                false
            }
        };

        if !self.service.test_connection().await {
            tracing::debug!("worker API still unreachable");
            return None;
        }
        let pending = match self.service.pending_changes().await {
            Ok(pending) => pending.len(),
            Err(e) => {
                tracing::warn!("failed to read pending changes: {}", e);
                0
            }
        };
        if !was_offline && pending == 0 {
            tracing::debug!("online with no pending changes");
            return None;
        }

        if was_offline {
            tracing::info!("worker API reachable again; syncing");
        } else {
            tracing::info!("syncing {} pending changes", pending);
        }
        let replay = match self.service.sync_pending_worker_changes().await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("failed to replay pending changes: {}", e);
                Default::default()
            }
        };
        let mappings = match self.service.sync_worker_mappings().await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!("failed to sync id mappings: {}", e);
                None
            }
        };

        Some(ReconnectReport { replay, mappings })
    }

    /// Spawn the polling loop.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                "connectivity monitor started (every {}s)",
                self.interval.as_secs()
            );

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = self.shutdown.notified() => {
                        tracing::info!("connectivity monitor received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Some(report) = self.tick().await {
                            tracing::info!(
                                "reconnected: {} replayed, {} still pending",
                                report.replay.success,
                                report.replay.failed
                            );
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKvStore;
    use crate::testing::{ScriptedApi, raw};
    use crate::types::{MappingSyncReport, ReplayReport};
    use workerdesk_core::{FrontendId, WorkerStatus};

    fn setup(api: Arc<ScriptedApi>) -> (Arc<WorkerSyncService>, ConnectivityMonitor) {
        let service = Arc::new(WorkerSyncService::new(api, Arc::new(MemoryKvStore::new())));
        let monitor = ConnectivityMonitor::new(service.clone(), Duration::from_millis(10));
        (service, monitor)
    }

    #[tokio::test]
    async fn reconnect_replays_and_resyncs() {
        let api = Arc::new(ScriptedApi::with_roster(vec![raw(Some("5"), "Meena", "5550007")]));
        api.set_online(false);
        let (service, monitor) = setup(api.clone());

        service
            .update_worker_status(&FrontendId::new("meena_5550007"), WorkerStatus::Active, "")
            .await
            .unwrap();
        assert_eq!(monitor.tick().await, None);

        api.set_online(true);
        let report = monitor.tick().await.unwrap();
        assert_eq!(report.replay, ReplayReport { success: 1, failed: 0 });
        assert_eq!(
            report.mappings,
            Some(MappingSyncReport { workers: 1, pinned: 0 })
        );
        assert!(service.pending_changes().await.unwrap().is_empty());

        // Steady state: nothing further to do.
        assert_eq!(monitor.tick().await, None);
    }

    #[tokio::test]
    async fn queued_changes_replay_even_when_flag_already_online() {
        let api = Arc::new(ScriptedApi::with_roster(vec![
            raw(Some("5"), "Meena", "5550007"),
            raw(Some("6"), "Kiran", "5550008"),
        ]));
        api.set_online(false);
        let (service, monitor) = setup(api.clone());

        service
            .approve_worker(&FrontendId::new("meena_5550007"), "")
            .await
            .unwrap();

        // An online operator action clears the offline flag before the monitor runs.
        api.set_online(true);
        let outcome = service
            .approve_worker(&FrontendId::new("kiran_5550008"), "")
            .await
            .unwrap();
        assert!(outcome.persisted);
        assert!(!service.offline_status().await.unwrap().offline);

        let report = monitor.tick().await.unwrap();
        assert_eq!(report.replay, ReplayReport { success: 1, failed: 0 });
        assert!(service.pending_changes().await.unwrap().is_empty());
        assert_eq!(monitor.tick().await, None);
    }

    #[tokio::test]
    async fn online_ticks_do_not_sync() {
        let api = Arc::new(ScriptedApi::with_roster(vec![]));
        let (_, monitor) = setup(api.clone());

        assert_eq!(monitor.tick().await, None);
        assert_eq!(api.list_calls(), 0);
    }

    #[tokio::test]
    async fn loop_stops_on_shutdown() {
        let api = Arc::new(ScriptedApi::with_roster(vec![]));
        let (_, monitor) = setup(api.clone());
        let shutdown = monitor.shutdown_handle();

        let handle = monitor.start();
        tokio::time::sleep(Duration::from_millis(35)).await;
        shutdown.notify_one();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor did not stop")
            .unwrap();
        assert!(api.probe_calls() >= 1);
    }
}

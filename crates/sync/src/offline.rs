//! Durable offline flag written by the connectivity probe.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::SyncResult;
use crate::storage::{KEY_API_OFFLINE, KEY_API_OFFLINE_SINCE, KeyValueStore};
use crate::types::OfflineStatus;

/// View over the `api_offline` / `api_offline_since` keys.
#[derive(Clone)]
pub struct OfflineState {
    store: Arc<dyn KeyValueStore>,
}

impl OfflineState {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn status(&self) -> SyncResult<OfflineStatus> {
        let offline = self.store.get(KEY_API_OFFLINE).await?.as_deref() == Some("true");
        let since = self
            .store
            .get(KEY_API_OFFLINE_SINCE)
            .await?
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(OfflineStatus {
            offline,
            since: if offline { since } else { None },
        })
    }

    pub async fn is_offline(&self) -> SyncResult<bool> {
        Ok(self.status().await?.offline)
    }

    /// Record the backend as unreachable. The first `since` of an outage is kept.
    pub async fn mark_offline(&self) -> SyncResult<()> {
        let current = self.status().await?;
        self.store.set(KEY_API_OFFLINE, "true").await?;
        if current.since.is_none() {
            self.store
                .set(KEY_API_OFFLINE_SINCE, &Utc::now().to_rfc3339())
                .await?;
        }
        Ok(())
    }

    pub async fn mark_online(&self) -> SyncResult<()> {
        self.store.set(KEY_API_OFFLINE, "false").await?;
        self.store.remove(KEY_API_OFFLINE_SINCE).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKvStore;

    #[tokio::test]
    async fn starts_online() {
        let state = OfflineState::new(Arc::new(MemoryKvStore::new()));
        assert_eq!(state.status().await.unwrap(), OfflineStatus::default());
    }

    #[tokio::test]
    async fn outage_keeps_first_timestamp_and_clears_on_recovery() {
        let store = Arc::new(MemoryKvStore::new());
        let state = OfflineState::new(store.clone());

        state.mark_offline().await.unwrap();
        let first = state.status().await.unwrap();
        assert!(first.offline);
        assert!(first.since.is_some());

        state.mark_offline().await.unwrap();
        assert_eq!(state.status().await.unwrap().since, first.since);

        state.mark_online().await.unwrap();
        assert!(!state.is_offline().await.unwrap());
        assert_eq!(store.get(KEY_API_OFFLINE_SINCE).await.unwrap(), None);
        assert_eq!(store.get(KEY_API_OFFLINE).await.unwrap().as_deref(), Some("false"));
    }
}

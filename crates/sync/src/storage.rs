//! Durable local key-value storage.
//!
//! The sync layer keeps three keys here (offline flag, offline-since
//! timestamp, the pending-change queue). [`SqliteKvStore`] is the durable
//! implementation; [`MemoryKvStore`] backs tests and throwaway sessions.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::error::{SyncError, SyncResult};

pub const KEY_API_OFFLINE: &str = "api_offline";
pub const KEY_API_OFFLINE_SINCE: &str = "api_offline_since";
pub const KEY_PENDING_WORKER_CHANGES: &str = "pendingWorkerChanges";

/// String key-value store with read-modify-write left to callers.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> SyncResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> SyncResult<()>;

    async fn remove(&self, key: &str) -> SyncResult<()>;
}

/// In-memory store for tests/dev.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> SyncResult<Option<String>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> SyncResult<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

/// SQLite-backed store (`kv_store` table).
///
/// Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct SqliteKvStore {
    pool: SqlitePool,
}

impl SqliteKvStore {
    /// Open (creating if needed) the database file at `path`.
    pub async fn open(path: &Path) -> SyncResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                SyncError::storage(format!(
                    "failed to create store directory at {:?}: {}",
                    parent, e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        tracing::debug!("opened key-value store at {:?}", path);
        Self::with_pool(pool).await
    }

    /// Private in-memory database (single connection so every query sees it).
    pub async fn in_memory() -> SyncResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> SyncResult<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key         TEXT PRIMARY KEY,
                value       TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl KeyValueStore for SqliteKvStore {
    async fn get(&self, key: &str) -> SyncResult<Option<String>> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get::<String, _>("value")?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> SyncResult<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exercise(store: &dyn KeyValueStore) {
        assert_eq!(store.get("missing").await.unwrap(), None);

        store.set(KEY_API_OFFLINE, "true").await.unwrap();
        assert_eq!(store.get(KEY_API_OFFLINE).await.unwrap().as_deref(), Some("true"));

        store.set(KEY_API_OFFLINE, "false").await.unwrap();
        assert_eq!(store.get(KEY_API_OFFLINE).await.unwrap().as_deref(), Some("false"));

        store.remove(KEY_API_OFFLINE).await.unwrap();
        assert_eq!(store.get(KEY_API_OFFLINE).await.unwrap(), None);

        // Removing an absent key is not an error.
        store.remove(KEY_API_OFFLINE).await.unwrap();
    }

    #[tokio::test]
    async fn memory_store_get_set_remove() {
        exercise(&MemoryKvStore::new()).await;
    }

    #[tokio::test]
    async fn sqlite_store_get_set_remove() {
        let store = SqliteKvStore::in_memory().await.unwrap();
        exercise(&store).await;
    }

    #[tokio::test]
    async fn sqlite_store_survives_reopen() {
        let dir = std::env::temp_dir().join(format!("workerdesk-kv-{}", uuid::Uuid::now_v7()));
        let path = dir.join("store.db");

        {
            let store = SqliteKvStore::open(&path).await.unwrap();
            store.set(KEY_PENDING_WORKER_CHANGES, "[]").await.unwrap();
            store.pool.close().await;
        }

        let reopened = SqliteKvStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.get(KEY_PENDING_WORKER_CHANGES).await.unwrap().as_deref(),
            Some("[]")
        );

        reopened.pool.close().await;
        let _ = std::fs::remove_dir_all(&dir);
    }
}

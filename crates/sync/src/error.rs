//! Error taxonomy for the sync layer.

use workerdesk_core::DomainError;

/// Result alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("client is offline")]
    Offline,
    #[error("network error: {0}")]
    Network(String),
    #[error("API error ({0}): {1}")]
    Api(u16, String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl SyncError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Backend unreachable (as opposed to reachable-but-refusing).
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Offline | Self::Network(_))
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Parse(err.to_string());
        }
        match err.status() {
            Some(status) => Self::Api(status.as_u16(), err.to_string()),
            None => Self::Network(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

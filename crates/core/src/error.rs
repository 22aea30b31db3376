//! Errors raised by worker domain parsing.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Rejected operator or backend input. Never carries I/O failures; those are
/// `SyncError`s in the sync crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Text that does not name a known value, such as an unknown status.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An empty or malformed worker identifier.
    #[error("invalid {kind}: {value:?}")]
    InvalidId { kind: &'static str, value: String },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(kind: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidId {
            kind,
            value: value.into(),
        }
    }
}

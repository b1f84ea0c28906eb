/// Error types for the sync engine
use thiserror::Error;

use crate::remote::RecordType;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyncError {
    /// Timeouts and connectivity faults. Retried with exponential backoff up
    /// to a bounded attempt count, then surfaced.
    #[error("transient network failure: {0}")]
    Transient(String),

    /// The deployed remote schema does not know this field, or cannot write
    /// it. Never retried; the write proceeds with the field omitted.
    #[error("schema does not support field `{field}` on {record_type} records")]
    SchemaUnsupported {
        record_type: RecordType,
        field: String,
    },

    /// Write outside the acting principal's ownership scope. Terminal.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Remote state changed concurrently; the local optimistic delta is
    /// discarded and the authoritative value reloaded.
    #[error("conflicting remote update: {0}")]
    Conflict(String),

    /// Malformed identifier or invalid state transition. Rejected before any
    /// dispatch.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Transient(_))
    }

    pub(crate) fn executor_gone() -> Self {
        SyncError::Internal("state executor is no longer running".into())
    }
}

impl From<resilience::RetryError<SyncError>> for SyncError {
    fn from(err: resilience::RetryError<SyncError>) -> Self {
        match err {
            resilience::RetryError::Aborted(e) => e,
            resilience::RetryError::MaxRetriesExceeded { last, .. } => last,
        }
    }
}

/// Result type alias for engine operations
pub type SyncResult<T> = Result<T, SyncError>;

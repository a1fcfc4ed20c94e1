//! Top level error module for the crate

use zingo_status::sync_status::SyncStatus;

/// Top level error enum encapsulating any error that may occur during sync
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// A sync pass failed
    #[error("Sync failed. {0}")]
    Engine(String),
    /// The sync was cancelled
    #[error("Sync cancelled")]
    Cancelled,
    /// A retry was requested while sync was not in a failed state
    #[error("Retry is not available while {0}")]
    RetryUnavailable(SyncStatus),
}

/// Result type of sync operations
pub type SyncResult<T> = Result<T, SyncError>;

//! Traits for interfacing an account's sync engine with progress reporting

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{error::SyncResult, source::ProgressReporter};

/// Syncs one account with the blockchain.
#[async_trait]
pub trait SyncEngine: Send + Sync {
    /// Runs one sync pass up to the current chain tip, publishing a
    /// [`zingo_status::sync_progress::SyncUpdate`] through `reporter` after each batch.
    ///
    /// Must return [`crate::error::SyncError::Cancelled`] promptly once `cancellation_token`
    /// is cancelled.
    async fn sync(
        &self,
        reporter: &ProgressReporter,
        cancellation_token: CancellationToken,
    ) -> SyncResult<()>;
}

//! The progress of one account, published by its sync loop and observed by the aggregator.

use std::sync::Arc;

use tokio::sync::{futures::Notified, watch, Notify};
use zingo_status::{
    sync_progress::{SyncProgress, SyncUpdate},
    sync_status::SyncStatus,
};

use crate::error::{SyncError, SyncResult};

/// Creates the two ends of an account's progress: the reporter is held by the account's
/// sync loop, the source is handed to whoever displays progress.
pub fn progress_channel() -> (ProgressReporter, ProgressSource) {
    let (sender, receiver) = watch::channel(SyncProgress::disconnected());
    let retry = Arc::new(Notify::new());
    (
        ProgressReporter {
            sender,
            retry: retry.clone(),
        },
        ProgressSource { receiver, retry },
    )
}

/// Publishes the progress of one account. Dropping it tells the sources the account is gone.
#[derive(Debug)]
pub struct ProgressReporter {
    sender: watch::Sender<SyncProgress>,
    retry: Arc<Notify>,
}

impl ProgressReporter {
    /// Publishes a snapshot as is.
    pub fn publish(&self, progress: SyncProgress) {
        log::debug!("Sync progress: {progress}");
        self.sender.send_replace(progress);
    }

    /// The last published snapshot.
    pub fn current(&self) -> SyncProgress {
        self.sender.borrow().clone()
    }

    /// A sync pass started.
    pub fn begin(&self) {
        self.publish(SyncProgress::from_parts(
            0,
            0,
            0,
            true,
            SyncStatus::InProgress,
            None,
        ));
    }

    /// The sync engine finished a batch.
    pub fn report(&self, update: &SyncUpdate) {
        self.publish(SyncProgress::from_sync_update(update));
    }

    /// The sync pass reached the chain tip.
    pub fn finish(&self) {
        let progress = self.current().completed();
        self.publish(progress.with_status(SyncStatus::CaughtUp, false, None));
    }

    /// The account stopped syncing without an error.
    pub fn disconnect(&self) {
        let progress = self.current();
        self.publish(progress.with_status(SyncStatus::Disconnected, false, None));
    }

    /// The sync pass failed.
    pub fn fail(&self, error: &SyncError) {
        let progress = self.current();
        self.publish(progress.with_status(
            SyncStatus::DisconnectedWithError,
            false,
            Some(error.to_string()),
        ));
    }

    /// Resolves once a retry is requested through a [`ProgressSource`]. A request made
    /// while nobody was waiting is kept for the next wait.
    pub fn retry_requested(&self) -> Notified<'_> {
        self.retry.notified()
    }
}

/// Observes the progress of one account.
#[derive(Clone, Debug)]
pub struct ProgressSource {
    receiver: watch::Receiver<SyncProgress>,
    retry: Arc<Notify>,
}

impl ProgressSource {
    /// The latest snapshot.
    pub fn progress(&self) -> SyncProgress {
        self.receiver.borrow().clone()
    }

    /// The latest snapshot, marking it as seen by [`Self::changed`].
    pub fn snapshot(&mut self) -> SyncProgress {
        self.receiver.borrow_and_update().clone()
    }

    /// Waits for a snapshot not yet seen. Returns `false` once the reporter is dropped.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Asks the account's sync loop to retry now. Only available after a failure.
    pub fn request_retry(&self) -> SyncResult<()> {
        let status = self.receiver.borrow().status();
        if !status.can_retry() {
            return Err(SyncError::RetryUnavailable(status));
        }
        self.retry.notify_one();
        Ok(())
    }
}

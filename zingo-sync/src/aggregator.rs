//! Blends the progress of every account into the one progress shown to the user.

use futures::future::select_all;
use tokio::sync::watch;
use zingo_status::{sync_progress::SyncProgress, sync_status::SyncStatus};

use crate::{
    error::{SyncError, SyncResult},
    source::ProgressSource,
};

/// Blends member snapshots.
///
/// The range sums `to - from` and the position sums `current - from` over the members in
/// progress, so finished accounts no longer weigh on the fraction complete. The status
/// follows [`SyncStatus::blend`] over every member, and the first error found is kept.
/// # Examples
///
/// ```
/// use zingo_status::{sync_progress::SyncProgress, sync_status::SyncStatus};
/// use zingo_sync::aggregator::blend;
///
/// let syncing = SyncProgress::from_parts(0, 100, 50, true, SyncStatus::InProgress, None);
/// let done = SyncProgress::from_parts(0, 0, 0, false, SyncStatus::CaughtUp, None);
/// let blended = blend([&syncing, &done]);
/// assert_eq!((blended.to(), blended.current()), (100, 50));
/// assert!(blended.in_progress());
/// ```
pub fn blend<'a>(members: impl IntoIterator<Item = &'a SyncProgress>) -> SyncProgress {
    let mut to = 0u64;
    let mut current = 0u64;
    let mut in_progress = false;
    let mut last_error = None;
    let mut statuses = Vec::new();
    for member in members {
        if member.in_progress() {
            in_progress = true;
            to = to.saturating_add(member.to() - member.from());
            current = current.saturating_add(member.current() - member.from());
        }
        if last_error.is_none() {
            last_error = member.last_error().clone();
        }
        statuses.push(member.status());
    }
    SyncProgress::from_parts(
        0,
        to,
        current,
        in_progress,
        SyncStatus::blend(statuses),
        last_error,
    )
}

/// Holds the progress sources of every account and the blend of them.
#[derive(Debug)]
pub struct ProgressAggregator {
    sources: Vec<ProgressSource>,
    blended: watch::Sender<SyncProgress>,
}

impl Default for ProgressAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressAggregator {
    /// An aggregator with no sources.
    pub fn new() -> Self {
        let (blended, _) = watch::channel(SyncProgress::disconnected());
        Self {
            sources: Vec::new(),
            blended,
        }
    }

    /// Observes the blended progress.
    pub fn subscribe(&self) -> watch::Receiver<SyncProgress> {
        self.blended.subscribe()
    }

    /// The current blended progress.
    pub fn blended(&self) -> SyncProgress {
        self.blended.borrow().clone()
    }

    /// Number of sources subscribed.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// True with no sources subscribed.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    fn recompute(&mut self) -> SyncProgress {
        let snapshots: Vec<SyncProgress> = self
            .sources
            .iter_mut()
            .map(ProgressSource::snapshot)
            .collect();
        let blended = blend(&snapshots);
        self.blended.send_replace(blended.clone());
        blended
    }

    /// Replaces the subscribed sources, for example after accounts were added or removed,
    /// and blends them right away.
    pub fn subscribe_and_merge(
        &mut self,
        sources: impl IntoIterator<Item = ProgressSource>,
    ) -> SyncProgress {
        self.sources = sources.into_iter().collect();
        log::debug!("Aggregating progress of {} accounts", self.sources.len());
        self.recompute()
    }

    /// Drops every source and resets the blend.
    pub fn clear(&mut self) {
        self.sources.clear();
        self.recompute();
    }

    /// Waits for any source to publish and returns the new blend. Sources whose reporter
    /// is gone are dropped. Never resolves without sources.
    pub async fn changed(&mut self) -> SyncProgress {
        if self.sources.is_empty() {
            return futures::future::pending().await;
        }
        let (changed, index, pending) = select_all(
            self.sources
                .iter_mut()
                .map(|source| Box::pin(source.changed())),
        )
        .await;
        drop(pending);
        if !changed {
            log::debug!("Progress source {index} closed");
            self.sources.remove(index);
        }
        self.recompute()
    }

    /// Asks every failed account to sync again. Returns how many were asked.
    ///
    /// Only available while the blended status is [`SyncStatus::DisconnectedWithError`].
    pub fn retry(&self) -> SyncResult<usize> {
        let status = self.blended().status();
        if !status.can_retry() {
            return Err(SyncError::RetryUnavailable(status));
        }
        let mut signalled = 0;
        for source in &self.sources {
            if source.request_retry().is_ok() {
                signalled += 1;
            }
        }
        log::info!("Retrying sync of {signalled} accounts");
        Ok(signalled)
    }
}

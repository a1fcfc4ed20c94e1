//! Snapshots of sync progress, for a single account or blended across accounts.

use getset::{CopyGetters, Getters};
use zcash_protocol::consensus::BlockHeight;

use crate::sync_status::SyncStatus;

/// What a sync engine reports after each scanned batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncUpdate {
    /// The highest block below which every block has been scanned.
    pub last_fully_scanned_block: Option<BlockHeight>,
    /// The chain tip at the start of this sync pass.
    pub tip_height: BlockHeight,
    /// Total work in this pass, counted in blocks.
    pub total_steps: u64,
    /// Work completed so far in this pass.
    pub current_step: u64,
    /// Set when the pass failed.
    pub last_error: Option<String>,
}

impl SyncUpdate {
    /// True once every step of the pass is done.
    pub fn is_complete(&self) -> bool {
        self.current_step >= self.total_steps
    }
}

/// A progress snapshot: a range, a position within it, and connectivity.
///
/// The counters always satisfy `from <= current <= to`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Getters, CopyGetters)]
pub struct SyncProgress {
    #[getset(get_copy = "pub")]
    from: u64,
    #[getset(get_copy = "pub")]
    to: u64,
    #[getset(get_copy = "pub")]
    current: u64,
    #[getset(get_copy = "pub")]
    in_progress: bool,
    #[getset(get_copy = "pub")]
    status: SyncStatus,
    #[getset(get = "pub")]
    last_error: Option<String>,
    #[getset(get_copy = "pub")]
    last_fully_scanned_block: Option<BlockHeight>,
    #[getset(get_copy = "pub")]
    tip_height: Option<BlockHeight>,
}

impl SyncProgress {
    /// Creates a snapshot, clamping `current` into `from..=to` and `to` to no less than `from`.
    /// # Examples
    ///
    /// ```
    /// use zingo_status::sync_progress::SyncProgress;
    /// use zingo_status::sync_status::SyncStatus;
    ///
    /// let progress = SyncProgress::from_parts(10, 5, 20, true, SyncStatus::InProgress, None);
    /// assert_eq!((progress.from(), progress.to(), progress.current()), (10, 10, 10));
    /// ```
    pub fn from_parts(
        from: u64,
        to: u64,
        current: u64,
        in_progress: bool,
        status: SyncStatus,
        last_error: Option<String>,
    ) -> Self {
        let to = to.max(from);
        Self {
            from,
            to,
            current: current.clamp(from, to),
            in_progress,
            status,
            last_error,
            last_fully_scanned_block: None,
            tip_height: None,
        }
    }

    /// The snapshot of an account that has not connected yet.
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Interprets an update from a sync engine.
    ///
    /// An update carrying an error moves to [`SyncStatus::DisconnectedWithError`].
    /// Otherwise the account is in progress until every step is done, then caught up.
    pub fn from_sync_update(update: &SyncUpdate) -> Self {
        let (in_progress, status) = match (&update.last_error, update.is_complete()) {
            (Some(_), _) => (false, SyncStatus::DisconnectedWithError),
            (None, false) => (true, SyncStatus::InProgress),
            (None, true) => (false, SyncStatus::CaughtUp),
        };
        let mut progress = Self::from_parts(
            0,
            update.total_steps,
            update.current_step,
            in_progress,
            status,
            update.last_error.clone(),
        );
        progress.last_fully_scanned_block = update.last_fully_scanned_block;
        progress.tip_height = Some(update.tip_height);
        progress
    }

    /// Steps left to do within the range.
    pub fn remaining(&self) -> u64 {
        self.to - self.current
    }

    /// Completed share of the range, from 0.0 to 1.0. An empty range counts as complete.
    pub fn fraction_complete(&self) -> f64 {
        let span = self.to - self.from;
        if span == 0 {
            1.0
        } else {
            (self.current - self.from) as f64 / span as f64
        }
    }

    /// Returns a copy in a new connectivity state, keeping the counters.
    pub fn with_status(
        &self,
        status: SyncStatus,
        in_progress: bool,
        last_error: Option<String>,
    ) -> Self {
        Self {
            status,
            in_progress,
            last_error,
            ..self.clone()
        }
    }

    /// Returns a copy with the position moved to the end of the range.
    pub fn completed(&self) -> Self {
        Self {
            current: self.to,
            ..self.clone()
        }
    }
}

impl std::fmt::Display for SyncProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.in_progress {
            write!(
                f,
                "{}: {} of {} ({:.1}%)",
                self.status,
                self.current - self.from,
                self.to - self.from,
                self.fraction_complete() * 100.0
            )
        } else {
            write!(
                f,
                "{}, errors: {}",
                self.status,
                self.last_error.as_deref().unwrap_or("None")
            )
        }
    }
}

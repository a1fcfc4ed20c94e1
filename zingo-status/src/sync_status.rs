//! Connectivity and progress state of one account's sync, and how several of them blend.

/// The state of an account's connection to its sync server.
///
/// No state is terminal. Every transition is driven by sync events except the
/// move out of [`SyncStatus::DisconnectedWithError`], which the user requests with a retry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SyncStatus {
    /// Not connected, and not known to have failed.
    #[default]
    Disconnected,
    /// Connected and scanning.
    InProgress,
    /// Connected and scanned up to the chain tip.
    CaughtUp,
    /// The last sync attempt failed. A retry may be requested.
    DisconnectedWithError,
}

impl SyncStatus {
    /// Precedence of this status when several accounts are blended into one.
    /// The status with the lowest rank wins.
    ///
    /// | status                  | rank |
    /// |-------------------------|------|
    /// | `Disconnected`          | 0    |
    /// | `InProgress`            | 1    |
    /// | `CaughtUp`              | 2    |
    /// | `DisconnectedWithError` | 3    |
    ///
    /// A single disconnected account therefore masks another account's error or caught up state.
    pub fn blend_rank(&self) -> u8 {
        match self {
            SyncStatus::Disconnected => 0,
            SyncStatus::InProgress => 1,
            SyncStatus::CaughtUp => 2,
            SyncStatus::DisconnectedWithError => 3,
        }
    }

    /// Blends member statuses into the single status shown to the user.
    /// An empty set blends to [`SyncStatus::Disconnected`].
    /// # Examples
    ///
    /// ```
    /// use zingo_status::sync_status::SyncStatus;
    ///
    /// let blended = SyncStatus::blend([SyncStatus::CaughtUp, SyncStatus::InProgress]);
    /// assert_eq!(blended, SyncStatus::InProgress);
    /// ```
    pub fn blend(statuses: impl IntoIterator<Item = SyncStatus>) -> SyncStatus {
        statuses
            .into_iter()
            .min_by_key(SyncStatus::blend_rank)
            .unwrap_or_default()
    }

    /// Whether the user may ask for this sync to be retried.
    pub fn can_retry(&self) -> bool {
        matches!(self, SyncStatus::DisconnectedWithError)
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Disconnected => write!(f, "disconnected"),
            SyncStatus::InProgress => write!(f, "syncing"),
            SyncStatus::CaughtUp => write!(f, "caught up"),
            SyncStatus::DisconnectedWithError => write!(f, "disconnected with error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SyncStatus::{self, *};
    use test_case::test_case;

    #[test_case(&[Disconnected, CaughtUp] => Disconnected; "disconnected masks caught up")]
    #[test_case(&[Disconnected, DisconnectedWithError] => Disconnected; "disconnected masks error")]
    #[test_case(&[CaughtUp, DisconnectedWithError] => CaughtUp; "caught up masks error")]
    #[test_case(&[CaughtUp, InProgress, CaughtUp] => InProgress; "any syncing account shows syncing")]
    #[test_case(&[DisconnectedWithError] => DisconnectedWithError; "single failed account")]
    #[test_case(&[] => Disconnected; "no accounts")]
    fn blend(statuses: &[SyncStatus]) -> SyncStatus {
        SyncStatus::blend(statuses.iter().copied())
    }

    #[test]
    fn only_errors_can_be_retried() {
        assert!(DisconnectedWithError.can_retry());
        assert!(!Disconnected.can_retry());
        assert!(!InProgress.can_retry());
        assert!(!CaughtUp.can_retry());
    }
}

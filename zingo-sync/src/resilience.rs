//! Retrying of requests that fail transiently.

use std::{future::Future, time::Duration};

use getset::CopyGetters;
use tokio_util::sync::CancellationToken;
use zingoconfig::ZingoConfig;

use crate::error::{SyncError, SyncResult};

/// How often, and how far apart, a failed request is retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    attempt_limit: u32,
    /// Fixed delay before each retry.
    delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy.
    pub fn new(attempt_limit: u32, delay: Duration) -> Self {
        Self {
            attempt_limit,
            delay,
        }
    }

    /// The policy configured for the wallet.
    pub fn from_config(config: &ZingoConfig) -> Self {
        Self::new(config.retry_attempt_limit, config.retry_delay)
    }
}

/// Runs `delegate` until it succeeds or has been retried `policy.attempt_limit()` times,
/// waiting `policy.delay()` between attempts.
///
/// Cancellation interrupts both the request and the delay. A [`SyncError::Cancelled`]
/// from the request is never retried.
pub async fn with_retry<T, F, Fut>(
    mut delegate: F,
    policy: RetryPolicy,
    cancellation_token: &CancellationToken,
) -> SyncResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SyncResult<T>>,
{
    let mut failure_count = 0;
    loop {
        let result = tokio::select! {
            result = delegate() => result,
            _ = cancellation_token.cancelled() => return Err(SyncError::Cancelled),
        };
        match result {
            Ok(value) => return Ok(value),
            Err(SyncError::Cancelled) => return Err(SyncError::Cancelled),
            Err(e) if failure_count >= policy.attempt_limit => {
                log::warn!("Request failed. No more retries. {e}");
                return Err(e);
            }
            Err(e) => {
                failure_count += 1;
                log::debug!(
                    "Request failed, retry {failure_count} of {} in {:?}. {e}",
                    policy.attempt_limit,
                    policy.delay
                );
                tokio::select! {
                    _ = tokio::time::sleep(policy.delay) => {}
                    _ = cancellation_token.cancelled() => return Err(SyncError::Cancelled),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_secs(2))
    }

    /// Fails the first `failures` attempts.
    async fn flaky(attempts: &AtomicU32, failures: u32) -> SyncResult<u32> {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= failures {
            Err(SyncError::Engine(format!("attempt {attempt}")))
        } else {
            Ok(attempt)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let attempts = &AtomicU32::new(0);
        let start = tokio::time::Instant::now();
        let result = with_retry(move || flaky(attempts, 2), policy(), &CancellationToken::new()).await;
        assert_eq!(result, Ok(3));
        assert!(start.elapsed() >= Duration::from_secs(4));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_attempt_limit() {
        let attempts = &AtomicU32::new(0);
        let result = with_retry(move || flaky(attempts, u32::MAX), policy(), &CancellationToken::new()).await;
        assert_eq!(result, Err(SyncError::Engine("attempt 4".to_string())));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_delay() {
        let attempts = &AtomicU32::new(0);
        let cancellation_token = CancellationToken::new();
        let canceller = cancellation_token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });
        let result = with_retry(move || flaky(attempts, u32::MAX), policy(), &cancellation_token).await;
        assert_eq!(result, Err(SyncError::Cancelled));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_requests_are_not_retried() {
        let attempts = &AtomicU32::new(0);
        let result: SyncResult<()> = with_retry(
            move || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(SyncError::Cancelled)
            },
            policy(),
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(result, Err(SyncError::Cancelled));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}

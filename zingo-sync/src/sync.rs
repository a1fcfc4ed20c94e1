//! Entrypoint for an account's sync loop

use tokio_util::sync::CancellationToken;
use zingoconfig::ZingoConfig;

use crate::{
    error::SyncError,
    resilience::{with_retry, RetryPolicy},
    source::ProgressReporter,
    traits::SyncEngine,
};

/// Syncs an account again and again until cancelled.
///
/// Each pass runs `engine` under the configured retry policy and leaves the account caught
/// up or disconnected with an error. The next pass starts once `sync_poll_interval` has
/// passed, or straight away when a retry is requested. On cancellation the account is
/// reported disconnected.
pub async fn run_sync_loop<E: SyncEngine>(
    engine: &E,
    reporter: &ProgressReporter,
    config: &ZingoConfig,
    cancellation_token: CancellationToken,
) {
    let policy = RetryPolicy::from_config(config);
    log::info!("Syncing account...");
    loop {
        reporter.begin();
        let pass_token = cancellation_token.clone();
        let result = with_retry(
            move || engine.sync(reporter, pass_token.clone()),
            policy,
            &cancellation_token,
        )
        .await;
        match result {
            Ok(()) => {
                log::info!("Account caught up");
                reporter.finish();
            }
            Err(SyncError::Cancelled) => break,
            Err(e) => {
                log::warn!("Sync failed: {e}");
                reporter.fail(&e);
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(config.sync_poll_interval) => {
                log::debug!("Polling for new blocks");
            }
            _ = reporter.retry_requested() => {
                log::info!("Sync retry requested");
            }
            _ = cancellation_token.cancelled() => break,
        }
    }
    log::info!("Sync stopped");
    reporter.disconnect();
}

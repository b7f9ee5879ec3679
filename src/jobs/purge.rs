use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::AppError;
use crate::store::{PurgeReport, RefreshTokenStore};

/// One purge pass: drop expired sessions and sessions revoked more than
/// `retention_days` ago.
pub async fn run_purge_once(
    tokens: &dyn RefreshTokenStore,
    retention_days: i64,
) -> Result<PurgeReport, AppError> {
    let report = tokens.purge_expired_and_stale_revoked(retention_days).await?;

    if report.expired + report.revoked > 0 {
        tracing::info!(
            expired = report.expired,
            revoked = report.revoked,
            "Purged refresh tokens"
        );
    } else {
        tracing::debug!("Refresh token purge found nothing to delete");
    }

    Ok(report)
}

/// Background task that purges refresh tokens every `every`.
/// The first pass runs immediately. Errors are logged and the loop keeps going.
pub fn spawn_purge_job(
    tokens: Arc<dyn RefreshTokenStore>,
    every: Duration,
    retention_days: i64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            if let Err(e) = run_purge_once(tokens.as_ref(), retention_days).await {
                tracing::error!("Error purging refresh tokens: {}", e);
            }
        }
    })
}

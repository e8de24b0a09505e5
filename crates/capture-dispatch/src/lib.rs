//! C5 and C6: the two background dispatcher loops. `spec.md` §4.4-§4.5.
//!
//! Shape is the teacher's heartbeat loop (`mqk_daemon::state::spawn_heartbeat`'s
//! `tokio::time::interval` tick) generalized with a `CancellationToken` so a
//! cycle in flight — or the sleep between cycles — can be interrupted
//! cooperatively rather than aborted mid-transaction.

use std::future::Future;
use std::time::Duration;

use capture_config::{NotificationDispatcherConfig, SessionDispatcherConfig};
use capture_schemas::{CaptureError, ScheduleNotification};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Run the session claim loop until cancelled. Returns immediately if
/// disabled by configuration.
pub async fn run_session_claim_loop(
    pool: PgPool,
    config: SessionDispatcherConfig,
    cancel: CancellationToken,
) {
    if !config.enabled {
        info!("session claim dispatcher disabled by configuration; exiting");
        return;
    }

    info!(poll_interval = ?config.poll_interval, "session claim dispatcher starting");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("session claim dispatcher cancelled");
                return;
            }
            result = capture_db::session::claim_next_closed_for_processing(&pool) => {
                match result {
                    Ok(Some(session)) => {
                        info!(session_id = %session.id, state = %session.state, "claimed session for processing");
                    }
                    Ok(None) => {}
                    Err(err) => {
                        warn!(error = %err, "session claim cycle failed; will retry next tick");
                    }
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                info!("session claim dispatcher cancelled during sleep");
                return;
            }
            _ = tokio::time::sleep(config.poll_interval) => {}
        }
    }
}

/// Run the notification dispatcher loop until cancelled. `send` performs the
/// actual delivery against the external chat API; it must return
/// `Err(CaptureError::Cancelled)` if interrupted by `cancel` mid-flight so
/// `dispatch_pending` can abort the batch without marking anything.
pub async fn run_notification_loop<F, Fut>(
    pool: PgPool,
    config: NotificationDispatcherConfig,
    cancel: CancellationToken,
    mut send: F,
) where
    F: FnMut(&ScheduleNotification) -> Fut,
    Fut: Future<Output = Result<(), CaptureError>>,
{
    if !config.enabled {
        info!("notification dispatcher disabled by configuration; exiting");
        return;
    }

    info!(
        poll_interval = ?config.poll_interval,
        batch_size = config.batch_size,
        "notification dispatcher starting"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("notification dispatcher cancelled");
                return;
            }
            result = capture_db::notification::dispatch_pending(&pool, config.batch_size, &mut send) => {
                match result {
                    Ok(counts) if counts.claimed > 0 => {
                        info!(
                            claimed = counts.claimed,
                            sent = counts.sent,
                            failed = counts.failed,
                            "notification dispatch cycle complete"
                        );
                    }
                    Ok(_) => {}
                    Err(CaptureError::Cancelled) => {
                        info!("notification dispatch cycle cancelled mid-batch");
                        return;
                    }
                    Err(err) => {
                        error!(error = %err, "notification dispatch cycle failed; will retry next tick");
                    }
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                info!("notification dispatcher cancelled during sleep");
                return;
            }
            _ = tokio::time::sleep(config.poll_interval) => {}
        }
    }
}

/// Helper for callers that just want the default poll floor respected when
/// constructing a one-off interval outside the two loops above (e.g. tests).
pub fn floor_poll_interval(seconds: u64) -> Duration {
    Duration::from_secs(seconds.max(1))
}

//! C4: the notification repository. `spec.md` §4.3.

use std::future::Future;

use capture_schemas::{CaptureError, NotificationStatus, ScheduleNotification};
use sqlx::{postgres::PgRow, PgPool, Row};

/// `(claimed, sent, failed)` from one [`dispatch_pending`] cycle.
/// `sent + failed == claimed` unless the cycle was cancelled mid-batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchCounts {
    pub claimed: i64,
    pub sent: i64,
    pub failed: i64,
}

fn row_to_notification(row: PgRow) -> Result<ScheduleNotification, CaptureError> {
    let status: String = row.try_get("status")?;
    Ok(ScheduleNotification {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        message: row.try_get("message")?,
        status: NotificationStatus::parse(&status)?,
        created_at: row.try_get("created_at")?,
        sent_at: row.try_get("sent_at")?,
        schedule_date: row.try_get("schedule_date")?,
        source_session_id: row.try_get("source_session_id")?,
        notification_type: row.try_get("notification_type")?,
        event_ids: row.try_get("event_ids")?,
    })
}

/// Claim up to `batch_size` pending rows and deliver each through `send`.
///
/// Everything happens in one transaction: the claim (skip-locked read),
/// every per-row status write, and the commit. A `send` that returns
/// `CaptureError::Cancelled` aborts the whole cycle without committing —
/// claimed rows revert to `pending` on rollback, so cancellation never
/// leaves a partially-marked batch.
pub async fn dispatch_pending<F, Fut>(
    pool: &PgPool,
    batch_size: i64,
    mut send: F,
) -> Result<DispatchCounts, CaptureError>
where
    F: FnMut(&ScheduleNotification) -> Fut,
    Fut: Future<Output = Result<(), CaptureError>>,
{
    let mut tx = pool.begin().await.map_err(CaptureError::from)?;

    let rows = sqlx::query(
        "select id, user_id, message, status, created_at, sent_at, \
                schedule_date, source_session_id, notification_type, event_ids \
         from schedule_notification \
         where status = 'pending' \
         order by created_at asc, id asc \
         limit $1 \
         for update skip locked",
    )
    .bind(batch_size)
    .fetch_all(&mut *tx)
    .await
    .map_err(CaptureError::from)?;

    let claimed = rows
        .into_iter()
        .map(row_to_notification)
        .collect::<Result<Vec<_>, _>>()?;
    let mut counts = DispatchCounts {
        claimed: claimed.len() as i64,
        ..Default::default()
    };

    for notification in &claimed {
        match send(notification).await {
            Ok(()) => {
                sqlx::query(
                    "update schedule_notification set status = 'sent', sent_at = now() \
                     where id = $1",
                )
                .bind(&notification.id)
                .execute(&mut *tx)
                .await
                .map_err(CaptureError::from)?;
                counts.sent += 1;
            }
            Err(CaptureError::Cancelled) => return Err(CaptureError::Cancelled),
            Err(_) => {
                sqlx::query("update schedule_notification set status = 'failed' where id = $1")
                    .bind(&notification.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(CaptureError::from)?;
                counts.failed += 1;
            }
        }
    }

    tx.commit().await.map_err(CaptureError::from)?;

    Ok(counts)
}

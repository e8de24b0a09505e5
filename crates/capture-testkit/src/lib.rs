//! Fixtures shared by `capture-db`'s integration tests.
//!
//! Mirrors the teacher's `mqk_db::testkit_db_pool` plus the small builder
//! helpers `mqk-testkit` provides for scenario tests: connect, migrate, and
//! hand back ready-made rows so a test can start from a known state instead
//! of re-deriving the setup sequence every time.

use anyhow::Result;
use capture_schemas::{CaptureError, CaptureImage, CaptureSession, ScheduleNotification};
use sqlx::PgPool;
use uuid::Uuid;

/// Connect using `DATABASE_URL` and ensure migrations are applied.
pub async fn testkit_db_pool() -> Result<PgPool> {
    let pool = capture_db::connect_from_env().await?;
    capture_db::migrate(&pool).await?;
    Ok(pool)
}

/// A fresh `Open` session for a synthetic user. `user_id` should be unique
/// per test (e.g. derived from a random i64) so parallel tests never race
/// the single-open-per-user index against each other.
pub async fn new_open_session(pool: &PgPool, user_id: i64) -> Result<CaptureSession, CaptureError> {
    capture_db::session::create(pool, user_id, Some("testkit")).await
}

/// A `Closed` session carrying `image_count` images, appended in order
/// while still `Open`, then closed.
pub async fn new_closed_session_with_images(
    pool: &PgPool,
    user_id: i64,
    image_count: u32,
) -> Result<(CaptureSession, Vec<CaptureImage>), CaptureError> {
    let session = new_open_session(pool, user_id).await?;

    let mut images = Vec::with_capacity(image_count as usize);
    for i in 0..image_count {
        let object_key = format!("testkit/{}/{i}", session.id);
        images.push(capture_db::image::append_next(pool, session.id, &object_key, None).await?);
    }

    let closed = capture_db::session::close_open(pool, user_id)
        .await?
        .ok_or_else(|| CaptureError::Internal("close_open returned none for fresh session".into()))?;

    Ok((closed, images))
}

/// Insert a `pending` notification row directly — producers that enqueue
/// notifications are out of scope for this core, so there's no repository
/// insert operation to call through.
pub async fn new_pending_notification(
    pool: &PgPool,
    id: &str,
    user_id: i64,
    message: &str,
) -> Result<ScheduleNotification, CaptureError> {
    sqlx::query(
        "insert into schedule_notification (id, user_id, message, status) \
         values ($1, $2, $3, 'pending')",
    )
    .bind(id)
    .bind(user_id)
    .bind(message)
    .execute(pool)
    .await
    .map_err(CaptureError::from)?;

    Ok(ScheduleNotification {
        id: id.to_string(),
        user_id,
        message: message.to_string(),
        status: capture_schemas::NotificationStatus::Pending,
        created_at: chrono::Utc::now(),
        sent_at: None,
        schedule_date: None,
        source_session_id: None,
        notification_type: None,
        event_ids: Vec::new(),
    })
}

/// A random i64 suitable as a synthetic `user_id`, distinct across
/// concurrently-running tests with overwhelming probability.
pub fn fresh_user_id() -> i64 {
    (Uuid::new_v4().as_u128() & 0x7fff_ffff_ffff_ffff) as i64
}

//! C7: the thin ingress adapter. `spec.md` §4.6.
//!
//! This module has no transport dependency of its own — it is exercised by
//! `bot.rs` and by unit tests alike, against nothing but `capture-db`. All
//! grouping truth lives in the store; the adapter holds no state between
//! calls.

use capture_db::{image, session};
use capture_schemas::{CaptureError, CaptureSession, SessionState};
use uuid::Uuid;

/// Outcome of a stored upload, used to compose the reply text.
#[derive(Debug, Clone, Copy)]
pub struct UploadOutcome {
    pub session_id: Uuid,
    pub sequence: i32,
    /// `true` when this upload both opened and closed the session in one
    /// call — the "implicit single" path from `spec.md` §4.6.
    pub auto_closed: bool,
}

/// `/start_session`: create a new `Open` session, or reuse the existing one
/// if a concurrent call already won the race.
pub async fn start_session(
    pool: &sqlx::PgPool,
    user_id: i64,
    source: Option<&str>,
) -> Result<CaptureSession, CaptureError> {
    match session::create(pool, user_id, source).await {
        Ok(created) => Ok(created),
        Err(CaptureError::UniquenessConflict) => {
            session::get_open(pool, user_id).await?.ok_or_else(|| {
                CaptureError::Internal(format!(
                    "start_session: UniquenessConflict but no Open row for user {user_id}"
                ))
            })
        }
        Err(other) => Err(other),
    }
}

/// `/close` or `/done`: close the user's `Open` session, if any.
pub async fn close_session(
    pool: &sqlx::PgPool,
    user_id: i64,
) -> Result<Option<CaptureSession>, CaptureError> {
    session::close_open(pool, user_id).await
}

/// A valid upload (photo or document already staged with the blob store,
/// yielding `object_key`). Chooses between the explicit-multi and
/// implicit-single paths per `spec.md` §4.6:
///
/// - an `Open` session already exists for `user_id` -> append into it.
/// - none exists -> create one, append, and close it in the same call,
///   unless a concurrent upload raced us and created one first, in which
///   case we fall through to the multi-upload path against that session.
pub async fn handle_upload(
    pool: &sqlx::PgPool,
    user_id: i64,
    object_key: &str,
    external_message_id: Option<i64>,
    source: Option<&str>,
) -> Result<UploadOutcome, CaptureError> {
    if let Some(open) = session::get_open(pool, user_id).await? {
        let appended = image::append_next(pool, open.id, object_key, external_message_id).await?;
        return Ok(UploadOutcome {
            session_id: open.id,
            sequence: appended.sequence,
            auto_closed: false,
        });
    }

    match session::create(pool, user_id, source).await {
        Ok(created) => {
            let appended =
                image::append_next(pool, created.id, object_key, external_message_id).await?;
            session::update_state(pool, created.id, SessionState::Closed, None).await?;
            Ok(UploadOutcome {
                session_id: created.id,
                sequence: appended.sequence,
                auto_closed: true,
            })
        }
        Err(CaptureError::UniquenessConflict) => {
            let open = session::get_open(pool, user_id).await?.ok_or_else(|| {
                CaptureError::Internal(format!(
                    "handle_upload: UniquenessConflict but no Open row for user {user_id}"
                ))
            })?;
            let appended = image::append_next(pool, open.id, object_key, external_message_id).await?;
            Ok(UploadOutcome {
                session_id: open.id,
                sequence: appended.sequence,
                auto_closed: false,
            })
        }
        Err(other) => Err(other),
    }
}

/// Reply text for a successful `/close`/`/done`, carrying the total image
/// count (scenario 1 in `spec.md` §8 expects a `"N image(s)"` substring).
pub fn close_reply(image_count: i64) -> String {
    format!("Session closed with {image_count} image(s).")
}

/// Reply text for `/close`/`/done` with nothing open.
pub fn close_reply_no_open_session() -> &'static str {
    "No open session to close."
}

/// Reply text after a stored upload.
pub fn upload_reply(outcome: &UploadOutcome) -> String {
    if outcome.auto_closed {
        format!(
            "Saved as image #{} and closed the session (single-upload mode).",
            outcome.sequence
        )
    } else {
        format!("Saved as image #{}.", outcome.sequence)
    }
}

/// Reply text for rejected (non-image) media. No repository call is made.
pub fn rejected_media_reply() -> &'static str {
    "That doesn't look like a schedule screenshot. Send a photo or image file."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_reply_includes_image_count() {
        assert!(close_reply(3).contains("3 image(s)"));
    }

    #[test]
    fn upload_reply_mentions_single_upload_mode_when_auto_closed() {
        let outcome = UploadOutcome {
            session_id: Uuid::new_v4(),
            sequence: 1,
            auto_closed: true,
        };
        assert!(upload_reply(&outcome).contains("single-upload mode"));
    }

    #[test]
    fn upload_reply_omits_auto_close_language_for_multi_upload() {
        let outcome = UploadOutcome {
            session_id: Uuid::new_v4(),
            sequence: 2,
            auto_closed: false,
        };
        assert!(!upload_reply(&outcome).contains("single-upload mode"));
    }
}

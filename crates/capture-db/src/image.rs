//! C3: the image repository. `spec.md` §4.2.

use capture_schemas::{CaptureError, CaptureImage};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

fn row_to_image(row: PgRow) -> Result<CaptureImage, CaptureError> {
    Ok(CaptureImage {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        sequence: row.try_get("sequence")?,
        object_key: row.try_get("object_key")?,
        external_message_id: row.try_get("external_message_id")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Append one image at the next gap-free sequence position.
///
/// Locks the session row first so concurrent appends to the same session
/// serialise on the `MAX(sequence) + 1` read; the BEFORE INSERT trigger
/// re-locks the session and rejects the insert unless it is `Open`.
pub async fn append_next(
    pool: &PgPool,
    session_id: Uuid,
    object_key: &str,
    external_message_id: Option<i64>,
) -> Result<CaptureImage, CaptureError> {
    let mut tx = pool.begin().await.map_err(CaptureError::from)?;

    let locked = sqlx::query("select id from capture_session where id = $1 for update")
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(CaptureError::from)?;
    if locked.is_none() {
        return Err(CaptureError::NotFound);
    }

    let (next_sequence,): (i32,) = sqlx::query_as(
        "select coalesce(max(sequence), 0) + 1 from capture_image where session_id = $1",
    )
    .bind(session_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(CaptureError::from)?;

    let inserted = sqlx::query(
        "insert into capture_image (id, session_id, sequence, object_key, external_message_id) \
         values ($1, $2, $3, $4, $5) \
         returning id, session_id, sequence, object_key, external_message_id, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(session_id)
    .bind(next_sequence)
    .bind(object_key)
    .bind(external_message_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(classify_insert_error)?;

    tx.commit().await.map_err(CaptureError::from)?;

    row_to_image(inserted)
}

fn classify_insert_error(err: sqlx::Error) -> CaptureError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some("23505") => return CaptureError::UniquenessConflict,
            Some("P0001") => return CaptureError::IllegalState(db_err.message().to_string()),
            _ => {}
        }
    }
    CaptureError::from(err)
}

pub async fn count_by_session(pool: &PgPool, session_id: Uuid) -> Result<i64, CaptureError> {
    let (n,): (i64,) =
        sqlx::query_as("select count(*)::bigint from capture_image where session_id = $1")
            .bind(session_id)
            .fetch_one(pool)
            .await
            .map_err(CaptureError::from)?;
    Ok(n)
}

/// Ordered by `sequence` ascending. Read-only snapshot.
pub async fn list_by_session(
    pool: &PgPool,
    session_id: Uuid,
) -> Result<Vec<CaptureImage>, CaptureError> {
    let rows = sqlx::query(
        "select id, session_id, sequence, object_key, external_message_id, created_at \
         from capture_image where session_id = $1 order by sequence asc",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await
    .map_err(CaptureError::from)?;

    rows.into_iter().map(row_to_image).collect()
}

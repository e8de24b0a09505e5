//! C2: the session repository. `spec.md` §4.1.

use capture_schemas::{transitions, CaptureError, CaptureSession, SessionState};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

const SELECT_COLUMNS: &str =
    "id, user_id, state::text as state, created_at, closed_at, error, source";

fn row_to_session(row: PgRow) -> Result<CaptureSession, CaptureError> {
    let state: String = row.try_get("state")?;
    Ok(CaptureSession {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        state: SessionState::parse(&state)?,
        created_at: row.try_get("created_at")?,
        closed_at: row.try_get("closed_at")?,
        error: row.try_get("error")?,
        source: row.try_get("source")?,
    })
}

/// Insert a new `Open` row. Fails with `UniquenessConflict` if the user
/// already has one; the caller recovers via [`get_open`].
pub async fn create(
    pool: &PgPool,
    user_id: i64,
    source: Option<&str>,
) -> Result<CaptureSession, CaptureError> {
    let row = sqlx::query(&format!(
        "insert into capture_session (id, user_id, state, source) \
         values ($1, $2, 'open', $3) \
         returning {SELECT_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(source)
    .fetch_one(pool)
    .await
    .map_err(CaptureError::from)?;

    row_to_session(row)
}

/// Read the user's `Open` row if one exists; otherwise insert one,
/// tolerating the race against a concurrent `create`/`get_or_create_open`.
pub async fn get_or_create_open(
    pool: &PgPool,
    user_id: i64,
    source: Option<&str>,
) -> Result<CaptureSession, CaptureError> {
    if let Some(existing) = get_open(pool, user_id).await? {
        return Ok(existing);
    }

    let inserted = sqlx::query(&format!(
        "insert into capture_session (id, user_id, state, source) \
         values ($1, $2, 'open', $3) \
         on conflict (user_id) where state = 'open' do nothing \
         returning {SELECT_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(source)
    .fetch_optional(pool)
    .await
    .map_err(CaptureError::from)?;

    if let Some(row) = inserted {
        return row_to_session(row);
    }

    get_open(pool, user_id).await?.ok_or_else(|| {
        CaptureError::Internal(format!(
            "get_or_create_open: no Open row survived for user {user_id} after insert race"
        ))
    })
}

/// Most recent `Open` row for `user_id`, if any.
pub async fn get_open(pool: &PgPool, user_id: i64) -> Result<Option<CaptureSession>, CaptureError> {
    let row = sqlx::query(&format!(
        "select {SELECT_COLUMNS} from capture_session \
         where user_id = $1 and state = 'open' \
         order by created_at desc limit 1"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(CaptureError::from)?;

    row.map(row_to_session).transpose()
}

/// Lock and close the user's `Open` row, in one statement. Returns `None`
/// if there wasn't one.
pub async fn close_open(pool: &PgPool, user_id: i64) -> Result<Option<CaptureSession>, CaptureError> {
    let row = sqlx::query(&format!(
        "with target as ( \
             select id from capture_session \
             where user_id = $1 and state = 'open' \
             order by created_at desc limit 1 \
             for update \
         ) \
         update capture_session set state = 'closed' \
         where id in (select id from target) \
         returning {SELECT_COLUMNS}"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(CaptureError::from)?;

    row.map(row_to_session).transpose()
}

/// Claim one `Closed` session that has at least one image, skipping rows
/// already locked by another claimer. Tie-break: ascending `closed_at`,
/// then `created_at`. Sessions without images are never claimed.
pub async fn claim_next_closed_for_processing(
    pool: &PgPool,
) -> Result<Option<CaptureSession>, CaptureError> {
    let row = sqlx::query(&format!(
        "with to_claim as ( \
             select s.id from capture_session s \
             where s.state = 'closed' \
               and exists (select 1 from capture_image i where i.session_id = s.id) \
             order by s.closed_at asc, s.created_at asc \
             limit 1 \
             for update of s skip locked \
         ) \
         update capture_session set state = 'processing' \
         where id in (select id from to_claim) \
         returning {SELECT_COLUMNS}"
    ))
    .fetch_optional(pool)
    .await
    .map_err(CaptureError::from)?;

    row.map(row_to_session).transpose()
}

pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<CaptureSession, CaptureError> {
    let row = sqlx::query(&format!("select {SELECT_COLUMNS} from capture_session where id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(CaptureError::from)?
        .ok_or(CaptureError::NotFound)?;

    row_to_session(row)
}

/// Direct transition. Pre-flight checked against
/// [`capture_schemas::transitions::is_legal`] so an obviously illegal move
/// never reaches the store; the transition trigger is the actual guard
/// against a concurrent writer racing this check.
pub async fn update_state(
    pool: &PgPool,
    id: Uuid,
    new_state: SessionState,
    error: Option<&str>,
) -> Result<CaptureSession, CaptureError> {
    let current = get_by_id(pool, id).await?;

    if !transitions::is_legal(current.state, new_state) {
        return Err(CaptureError::IllegalTransition {
            from: current.state,
            to: new_state,
        });
    }

    let row = sqlx::query(&format!(
        "update capture_session set state = $2, error = $3 \
         where id = $1 \
         returning {SELECT_COLUMNS}"
    ))
    .bind(id)
    .bind(new_state.as_str())
    .bind(error)
    .fetch_optional(pool)
    .await
    .map_err(|e| classify_update_state_error(e, current.state, new_state))?
    .ok_or(CaptureError::NotFound)?;

    row_to_session(row)
}

fn classify_update_state_error(
    err: sqlx::Error,
    from: SessionState,
    to: SessionState,
) -> CaptureError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("P0001") {
            return CaptureError::IllegalTransition { from, to };
        }
    }
    CaptureError::from(err)
}

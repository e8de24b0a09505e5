//! Shared types for the capture-session lifecycle and job-coordination layer.
//!
//! This crate holds the entities (`CaptureSession`, `CaptureImage`,
//! `ScheduleNotification`), the session state machine's transition table,
//! and the `CaptureError` taxonomy. It has no database dependency of its
//! own beyond decoding `sqlx::Error` into a `CaptureError`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod transitions;

// ---------------------------------------------------------------------------
// CaptureSession
// ---------------------------------------------------------------------------

/// A user-scoped grouping of one or more screenshot uploads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSession {
    pub id: Uuid,
    pub user_id: i64,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Free-form tag recording which ingress surface created the session.
    /// Never interpreted by the core.
    pub source: Option<String>,
}

/// Lifecycle states of a [`CaptureSession`].
///
/// Transitions permitted between these states are defined in
/// [`transitions::is_legal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Open,
    Closed,
    Processing,
    Done,
    Failed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Open => "open",
            SessionState::Closed => "closed",
            SessionState::Processing => "processing",
            SessionState::Done => "done",
            SessionState::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CaptureError> {
        match s {
            "open" => Ok(SessionState::Open),
            "closed" => Ok(SessionState::Closed),
            "processing" => Ok(SessionState::Processing),
            "done" => Ok(SessionState::Done),
            "failed" => Ok(SessionState::Failed),
            other => Err(CaptureError::Internal(format!(
                "invalid session state in store: {other}"
            ))),
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CaptureImage
// ---------------------------------------------------------------------------

/// One screenshot appended to a [`CaptureSession`], at a gap-free sequence
/// position within that session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureImage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub sequence: i32,
    pub object_key: String,
    pub external_message_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// ScheduleNotification
// ---------------------------------------------------------------------------

/// An outbound queue row awaiting delivery via an external chat API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleNotification {
    pub id: String,
    pub user_id: i64,
    pub message: String,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    /// Opaque payload, never interpreted by the core.
    pub schedule_date: Option<chrono::NaiveDate>,
    pub source_session_id: Option<Uuid>,
    pub notification_type: Option<String>,
    pub event_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CaptureError> {
        match s {
            "pending" => Ok(NotificationStatus::Pending),
            "sent" => Ok(NotificationStatus::Sent),
            "failed" => Ok(NotificationStatus::Failed),
            other => Err(CaptureError::Internal(format!(
                "invalid notification status in store: {other}"
            ))),
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Error taxonomy shared by every repository in `capture-db`.
///
/// Repositories translate store-level errors (constraint violations,
/// trigger rejections, connection failures) into one of these kinds and
/// never leak `sqlx::Error` across the crate boundary. Callers pattern-match
/// on the kind rather than inspecting driver internals.
#[derive(Debug)]
pub enum CaptureError {
    /// A store uniqueness constraint fired. Treat as a signal to reconcile
    /// state (e.g. re-read the open session), not as a fatal error.
    UniquenessConflict,
    /// A domain trigger rejected the write (e.g. append on a non-open
    /// session). Surface to the user as a benign reply; never retried.
    IllegalState(String),
    /// The session transition trigger rejected the update. Fatal for the
    /// current operation.
    IllegalTransition { from: SessionState, to: SessionState },
    /// The targeted id does not exist.
    NotFound,
    /// Connection reset, timeout, or similar. Dispatchers swallow and
    /// retry on the next tick; request handlers surface a generic reply.
    Transient(String),
    /// Cooperative cancellation. Never written as a status.
    Cancelled,
    /// Invariant violation, e.g. `RETURNING` produced no row when it
    /// should have. Fatal for the operation.
    Internal(String),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::UniquenessConflict => write!(f, "uniqueness conflict"),
            CaptureError::IllegalState(msg) => write!(f, "illegal state: {msg}"),
            CaptureError::IllegalTransition { from, to } => {
                write!(f, "illegal transition: {from} -> {to}")
            }
            CaptureError::NotFound => write!(f, "not found"),
            CaptureError::Transient(msg) => write!(f, "transient error: {msg}"),
            CaptureError::Cancelled => write!(f, "cancelled"),
            CaptureError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for CaptureError {}

impl CaptureError {
    /// Classify a raw `sqlx::Error` into the taxonomy above.
    ///
    /// Mirrors the teacher pattern of inspecting `SQLSTATE`/constraint name
    /// rather than trusting error message text.
    pub fn from_sqlx(err: sqlx::Error, illegal_state_constraint_hint: Option<&str>) -> Self {
        match &err {
            sqlx::Error::RowNotFound => CaptureError::NotFound,
            sqlx::Error::Database(db_err) => {
                match db_err.code().as_deref() {
                    // unique_violation
                    Some("23505") => CaptureError::UniquenessConflict,
                    // raise_exception from a guard trigger, or check_violation
                    Some("P0001") | Some("23514") => {
                        let msg = db_err.message().to_string();
                        if let Some(hint) = illegal_state_constraint_hint {
                            if msg.contains(hint) {
                                return CaptureError::IllegalState(msg);
                            }
                        }
                        CaptureError::IllegalState(msg)
                    }
                    // connection_exception, admin_shutdown, serialization_failure, etc.
                    Some(code)
                        if code.starts_with("08") || code == "40001" || code == "57P03" =>
                    {
                        CaptureError::Transient(db_err.message().to_string())
                    }
                    _ => CaptureError::Internal(db_err.message().to_string()),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                CaptureError::Transient(err.to_string())
            }
            other => CaptureError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for CaptureError {
    fn from(err: sqlx::Error) -> Self {
        CaptureError::from_sqlx(err, None)
    }
}

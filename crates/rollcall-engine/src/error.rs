use chrono::NaiveDateTime;
use rollcall_core::AttendanceStatus;
use rollcall_network::LockError;
use rollcall_storage::StorageError;
use thiserror::Error;

use crate::messages::Messages;

/// Outcome taxonomy for the attendance entry points.
///
/// Every variant except `Storage` carries enough context to render a
/// user-facing message through `Display`.
#[derive(Debug, Error)]
pub enum AttendanceError {
    /// Unknown credential, room, subject, schedule or session key
    #[error("{0}")]
    NotFound(String),

    /// Inactive user, wrong role for the entry point, or not enrolled
    #[error("{0}")]
    Forbidden(String),

    /// A primary record already exists for this class day
    #[error("{} {}", Messages::ALREADY_RECORDED_PREFIX, .existing)]
    Conflict { existing: AttendanceStatus },

    /// Early-arrival scan before the window opens
    #[error("{} {}", Messages::TOO_EARLY_PREFIX, .opens_at.format("%H:%M"))]
    TooEarly { opens_at: NaiveDateTime },

    /// Lock controller failure; only a manual unlock returns it
    #[error("door lock error: {0}")]
    Upstream(#[from] LockError),

    /// Infrastructure failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AttendanceError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }
}

impl From<sqlx::Error> for AttendanceError {
    fn from(e: sqlx::Error) -> Self {
        Self::Storage(StorageError::Database(e))
    }
}

impl From<rollcall_core::Error> for AttendanceError {
    fn from(e: rollcall_core::Error) -> Self {
        Self::Storage(StorageError::Domain(e))
    }
}

/// Result alias for the engine
pub type AttendanceResult<T> = Result<T, AttendanceError>;

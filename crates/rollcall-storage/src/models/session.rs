use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A schedule instantiated on one date because the instructor started class.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub id: i64,
    pub schedule_id: i64,
    pub session_date: NaiveDate,
    /// `active` or `ended`; see [`SessionStatus`]
    pub status: String,
    pub started_by: Option<i64>,
    pub started_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Active,
    Ended,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Ended => "ended",
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Membership of a user in a subject for one academic term.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Enrollment {
    pub id: i64,
    pub user_id: i64,
    pub subject_id: i64,
    pub academic_year: String,
    pub semester: String,
    /// `enrolled` or `dropped`
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn is_enrolled(&self) -> bool {
        self.status == "enrolled"
    }
}

use chrono::{DateTime, Utc};
use rollcall_core::constants::ADMIN_SUBJECT_CODE;
use serde::{Deserialize, Serialize};

/// Subject (course) that schedules belong to.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subject {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Subject {
    /// Returns `true` for the synthetic door-access subject.
    pub fn is_administrative(&self) -> bool {
        self.code == ADMIN_SUBJECT_CODE
    }
}

use chrono::{DateTime, Utc};
use rollcall_core::Role;
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;

/// User entity as owned by the external user directory.
///
/// The attendance engine only reads users. They are matched by `identifier`
/// for RFID scans and by `fingerprint_id` for fingerprint scans.
///
/// # Database Schema
///
/// Maps to the `users` table:
/// - `identifier` is unique (RFID tag or student/employee number)
/// - `fingerprint_id` is unique when present
/// - `role` is one of `student`, `instructor`, `admin`, `custodian`, `dean`
///
/// # Examples
///
/// ```
/// use rollcall_storage::models::User;
/// use rollcall_core::Role;
/// use chrono::Utc;
///
/// let user = User {
///     id: 1,
///     identifier: "2021-00042".to_string(),
///     fingerprint_id: Some(42),
///     full_name: "Ana Reyes".to_string(),
///     role: "student".to_string(),
///     active: true,
///     created_at: Utc::now(),
///     updated_at: Utc::now(),
/// };
///
/// assert_eq!(user.role().unwrap(), Role::Student);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,

    /// RFID tag / institutional number, unique
    pub identifier: String,

    /// Slot of the enrolled fingerprint template on the reader
    pub fingerprint_id: Option<i64>,

    pub full_name: String,

    /// Role text; use [`User::role`] for the typed value
    pub role: String,

    /// Inactive users are refused at every entry point
    pub active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Typed role.
    pub fn role(&self) -> StorageResult<Role> {
        Ok(self.role.parse()?)
    }
}

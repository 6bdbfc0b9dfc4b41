use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rollcall_core::{AttendanceStatus, AuthMethod, ScanLocation, ScanType};
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;

/// One scan turned into attendance.
///
/// A user's attendance for one class day is a small set of these rows: one
/// primary (`time_in` or `early_arrival`) record and any number of `time_out`
/// records. `time_out` rows may carry no schedule when no sign-in could be
/// matched at scan time.
///
/// # Database Schema
///
/// Maps to the `attendance_records` table. A partial unique index on
/// `(user_id, schedule_id, scan_date) WHERE scan_type IN ('time_in', 'early_arrival')`
/// enforces the one-primary-record rule at the storage level.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceRecord {
    pub id: i64,
    pub user_id: i64,
    pub schedule_id: Option<i64>,
    pub session_id: Option<i64>,
    pub scan_type: String,

    /// Local wall-clock time of the scan
    pub scan_time: NaiveDateTime,

    /// Class date the scan counts towards
    pub scan_date: NaiveDate,

    pub status: String,
    pub auth_method: String,
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttendanceRecord {
    pub fn status(&self) -> StorageResult<AttendanceStatus> {
        Ok(self.status.parse()?)
    }

    pub fn scan_type(&self) -> StorageResult<ScanType> {
        Ok(self.scan_type.parse()?)
    }

    pub fn auth_method(&self) -> StorageResult<AuthMethod> {
        Ok(self.auth_method.parse()?)
    }

    pub fn is_primary(&self) -> bool {
        self.scan_type().map(ScanType::is_primary).unwrap_or(false)
    }
}

/// Values for inserting an attendance record.
#[derive(Debug, Clone)]
pub struct NewAttendanceRecord {
    pub user_id: i64,
    pub schedule_id: Option<i64>,
    pub session_id: Option<i64>,
    pub scan_type: ScanType,
    pub scan_time: NaiveDateTime,
    pub scan_date: NaiveDate,
    pub status: AttendanceStatus,
    pub auth_method: AuthMethod,
    pub location: ScanLocation,
}

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use rollcall_core::constants::ADMIN_SUBJECT_CODE;
use rollcall_core::{AcademicTerm, ScheduleWindow, day_name, parse_day_name};
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;

/// Recurring weekly class slot, joined with its subject and room.
///
/// Every schedule query selects the subject code/name and room number
/// alongside the row so callers can render user-facing messages without a
/// second lookup.
///
/// # Database Schema
///
/// Maps to `schedules` joined with `subjects` and `rooms`. The tuple
/// `(subject_id, room_id, day_of_week, academic_year, semester)` is unique,
/// which is what makes on-demand schedule creation idempotent.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Schedule {
    pub id: i64,
    pub subject_id: i64,
    pub room_id: i64,

    /// Owner of the class slot, if any
    pub instructor_id: Option<i64>,

    /// Full English day name (`Monday` .. `Sunday`)
    pub day_of_week: String,

    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub academic_year: String,
    pub semester: String,
    pub created_at: DateTime<Utc>,

    pub subject_code: String,
    pub subject_name: String,
    pub room_number: String,
}

impl Schedule {
    pub fn weekday(&self) -> StorageResult<Weekday> {
        Ok(parse_day_name(&self.day_of_week)?)
    }

    pub fn term(&self) -> StorageResult<AcademicTerm> {
        Ok(AcademicTerm::new(
            self.academic_year.clone(),
            self.semester.parse()?,
        ))
    }

    /// Returns `true` for synthetic door-access schedules.
    pub fn is_administrative(&self) -> bool {
        self.subject_code == ADMIN_SUBJECT_CODE
    }

    /// The concrete occurrence of this slot on `date`.
    pub fn window_on(&self, date: NaiveDate) -> StorageResult<ScheduleWindow> {
        Ok(ScheduleWindow::new(date, self.start_time, self.end_time)?)
    }

    /// Returns `true` if `user_id` owns this slot.
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.instructor_id == Some(user_id)
    }
}

/// Values for inserting a schedule row.
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub subject_id: i64,
    pub room_id: i64,
    pub instructor_id: Option<i64>,
    pub day: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub term: AcademicTerm,
}

impl NewSchedule {
    pub fn day_name(&self) -> &'static str {
        day_name(self.day)
    }
}

#![allow(async_fn_in_trait)]

use crate::error::StorageResult;
use crate::models::{NewSchedule, Schedule};
use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use rollcall_core::constants::ADMIN_SUBJECT_CODE;
use rollcall_core::{AcademicTerm, day_name};
use sqlx::SqlitePool;

/// Column list shared by every schedule query; joins in subject and room labels.
pub(crate) const SELECT_SCHEDULE: &str = r#"
    SELECT s.id, s.subject_id, s.room_id, s.instructor_id, s.day_of_week,
           s.start_time, s.end_time, s.academic_year, s.semester, s.created_at,
           sub.code AS subject_code, sub.name AS subject_name, r.room_number
    FROM schedules s
    JOIN subjects sub ON sub.id = s.subject_id
    JOIN rooms r ON r.id = s.room_id
"#;

/// Repository trait for weekly class slots.
///
/// Lookups are scoped to one academic term unless they take a concrete date
/// that already pins the occurrence (session keys, sweeps).
pub trait ScheduleRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> StorageResult<Option<Schedule>>;

    /// All slots in a room on a weekday, ordered by start time
    async fn find_in_room_on_day(
        &self,
        room_id: i64,
        day: Weekday,
        term: &AcademicTerm,
    ) -> StorageResult<Vec<Schedule>>;

    /// Slots owned by `instructor_id` in a room on a weekday
    async fn find_owned_in_room_on_day(
        &self,
        instructor_id: i64,
        room_id: i64,
        day: Weekday,
        term: &AcademicTerm,
    ) -> StorageResult<Vec<Schedule>>;

    /// Slots in a room whose session on `date` is still active
    async fn find_with_active_session(
        &self,
        room_id: i64,
        date: NaiveDate,
    ) -> StorageResult<Vec<Schedule>>;

    /// Slot for (subject, room, weekday, term), the natural key
    async fn find_for_subject(
        &self,
        subject_id: i64,
        room_id: i64,
        day: Weekday,
        term: &AcademicTerm,
    ) -> StorageResult<Option<Schedule>>;

    /// Administrative slot for a room on a weekday
    async fn find_administrative(
        &self,
        room_id: i64,
        day: Weekday,
        term: &AcademicTerm,
    ) -> StorageResult<Option<Schedule>>;

    /// Slot identified by room number, weekday and exact start time.
    ///
    /// When several terms share the slot, the one with a session on `date` wins.
    async fn find_by_room_and_start(
        &self,
        room_number: &str,
        date: NaiveDate,
        start: NaiveTime,
    ) -> StorageResult<Option<Schedule>>;

    /// Slots on `date` that ended before `before` and never had a session.
    async fn find_ended_without_session(
        &self,
        date: NaiveDate,
        before: NaiveTime,
        term: &AcademicTerm,
    ) -> StorageResult<Vec<Schedule>>;

    /// Slots on `date` that ended before `before` and have a session row,
    /// active or ended.
    async fn find_ended_with_session(
        &self,
        date: NaiveDate,
        before: NaiveTime,
        term: &AcademicTerm,
    ) -> StorageResult<Vec<Schedule>>;

    /// Insert a slot; returns `None` if the natural key already exists.
    async fn insert_or_ignore(&self, schedule: &NewSchedule) -> StorageResult<Option<i64>>;
}

/// SQLite implementation of ScheduleRepository
pub struct SqliteScheduleRepository {
    pool: SqlitePool,
}

impl SqliteScheduleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Non-administrative slots on `date` ending before `before`, split on
    /// whether a session row exists for the date.
    async fn find_ended(
        &self,
        date: NaiveDate,
        before: NaiveTime,
        term: &AcademicTerm,
        with_session: bool,
    ) -> StorageResult<Vec<Schedule>> {
        let session_filter = if with_session { "EXISTS" } else { "NOT EXISTS" };
        let sql = format!(
            "{SELECT_SCHEDULE}
             WHERE s.day_of_week = ? AND s.end_time < ?
               AND s.academic_year = ? AND s.semester = ?
               AND sub.code <> ?
               AND {session_filter} (
                   SELECT 1 FROM sessions se
                   WHERE se.schedule_id = s.id AND se.session_date = ?
               )
             ORDER BY s.end_time"
        );
        let schedules = sqlx::query_as::<_, Schedule>(&sql)
            .bind(day_name(date.weekday()))
            .bind(before)
            .bind(&term.year)
            .bind(term.semester.as_str())
            .bind(ADMIN_SUBJECT_CODE)
            .bind(date)
            .fetch_all(&self.pool)
            .await?;

        Ok(schedules)
    }
}

impl ScheduleRepository for SqliteScheduleRepository {
    async fn find_by_id(&self, id: i64) -> StorageResult<Option<Schedule>> {
        let sql = format!("{SELECT_SCHEDULE} WHERE s.id = ?");
        let schedule = sqlx::query_as::<_, Schedule>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(schedule)
    }

    async fn find_in_room_on_day(
        &self,
        room_id: i64,
        day: Weekday,
        term: &AcademicTerm,
    ) -> StorageResult<Vec<Schedule>> {
        let sql = format!(
            "{SELECT_SCHEDULE}
             WHERE s.room_id = ? AND s.day_of_week = ?
               AND s.academic_year = ? AND s.semester = ?
             ORDER BY s.start_time"
        );
        let schedules = sqlx::query_as::<_, Schedule>(&sql)
            .bind(room_id)
            .bind(day_name(day))
            .bind(&term.year)
            .bind(term.semester.as_str())
            .fetch_all(&self.pool)
            .await?;

        Ok(schedules)
    }

    async fn find_owned_in_room_on_day(
        &self,
        instructor_id: i64,
        room_id: i64,
        day: Weekday,
        term: &AcademicTerm,
    ) -> StorageResult<Vec<Schedule>> {
        let sql = format!(
            "{SELECT_SCHEDULE}
             WHERE s.instructor_id = ? AND s.room_id = ? AND s.day_of_week = ?
               AND s.academic_year = ? AND s.semester = ?
             ORDER BY s.start_time"
        );
        let schedules = sqlx::query_as::<_, Schedule>(&sql)
            .bind(instructor_id)
            .bind(room_id)
            .bind(day_name(day))
            .bind(&term.year)
            .bind(term.semester.as_str())
            .fetch_all(&self.pool)
            .await?;

        Ok(schedules)
    }

    async fn find_with_active_session(
        &self,
        room_id: i64,
        date: NaiveDate,
    ) -> StorageResult<Vec<Schedule>> {
        let sql = format!(
            "{SELECT_SCHEDULE}
             JOIN sessions se ON se.schedule_id = s.id
             WHERE s.room_id = ? AND se.session_date = ? AND se.status = 'active'
             ORDER BY se.started_at DESC"
        );
        let schedules = sqlx::query_as::<_, Schedule>(&sql)
            .bind(room_id)
            .bind(date)
            .fetch_all(&self.pool)
            .await?;

        Ok(schedules)
    }

    async fn find_for_subject(
        &self,
        subject_id: i64,
        room_id: i64,
        day: Weekday,
        term: &AcademicTerm,
    ) -> StorageResult<Option<Schedule>> {
        let sql = format!(
            "{SELECT_SCHEDULE}
             WHERE s.subject_id = ? AND s.room_id = ? AND s.day_of_week = ?
               AND s.academic_year = ? AND s.semester = ?"
        );
        let schedule = sqlx::query_as::<_, Schedule>(&sql)
            .bind(subject_id)
            .bind(room_id)
            .bind(day_name(day))
            .bind(&term.year)
            .bind(term.semester.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(schedule)
    }

    async fn find_administrative(
        &self,
        room_id: i64,
        day: Weekday,
        term: &AcademicTerm,
    ) -> StorageResult<Option<Schedule>> {
        let sql = format!(
            "{SELECT_SCHEDULE}
             WHERE sub.code = ? AND s.room_id = ? AND s.day_of_week = ?
               AND s.academic_year = ? AND s.semester = ?"
        );
        let schedule = sqlx::query_as::<_, Schedule>(&sql)
            .bind(ADMIN_SUBJECT_CODE)
            .bind(room_id)
            .bind(day_name(day))
            .bind(&term.year)
            .bind(term.semester.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(schedule)
    }

    async fn find_by_room_and_start(
        &self,
        room_number: &str,
        date: NaiveDate,
        start: NaiveTime,
    ) -> StorageResult<Option<Schedule>> {
        let sql = format!(
            "{SELECT_SCHEDULE}
             LEFT JOIN sessions se ON se.schedule_id = s.id AND se.session_date = ?
             WHERE r.room_number = ? AND s.day_of_week = ? AND s.start_time = ?
             ORDER BY se.id IS NULL, s.academic_year DESC, s.id DESC
             LIMIT 1"
        );
        let schedule = sqlx::query_as::<_, Schedule>(&sql)
            .bind(date)
            .bind(room_number.trim())
            .bind(day_name(date.weekday()))
            .bind(start)
            .fetch_optional(&self.pool)
            .await?;

        Ok(schedule)
    }

    async fn find_ended_without_session(
        &self,
        date: NaiveDate,
        before: NaiveTime,
        term: &AcademicTerm,
    ) -> StorageResult<Vec<Schedule>> {
        self.find_ended(date, before, term, false).await
    }

    async fn find_ended_with_session(
        &self,
        date: NaiveDate,
        before: NaiveTime,
        term: &AcademicTerm,
    ) -> StorageResult<Vec<Schedule>> {
        self.find_ended(date, before, term, true).await
    }

    async fn insert_or_ignore(&self, schedule: &NewSchedule) -> StorageResult<Option<i64>> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO schedules
                (subject_id, room_id, instructor_id, day_of_week, start_time, end_time,
                 academic_year, semester)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(schedule.subject_id)
        .bind(schedule.room_id)
        .bind(schedule.instructor_id)
        .bind(schedule.day_name())
        .bind(schedule.start_time)
        .bind(schedule.end_time)
        .bind(&schedule.term.year)
        .bind(schedule.term.semester.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(result.last_insert_rowid()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;
    use crate::repositories::{RoomRepository, SqliteRoomRepository, SqliteSubjectRepository, SubjectRepository};
    use rollcall_core::Semester;

    fn term() -> AcademicTerm {
        AcademicTerm::new("2025-2026", Semester::First)
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    async fn seed(db: &Database) -> (i64, i64) {
        let room = SqliteRoomRepository::new(db.pool().clone())
            .create("R-101", None, None)
            .await
            .unwrap();
        let subject = SqliteSubjectRepository::new(db.pool().clone())
            .create("SUBJ101", "Intro")
            .await
            .unwrap();
        (room, subject)
    }

    fn monday_slot(subject_id: i64, room_id: i64, start: NaiveTime, end: NaiveTime) -> NewSchedule {
        NewSchedule {
            subject_id,
            room_id,
            instructor_id: None,
            day: Weekday::Mon,
            start_time: start,
            end_time: end,
            term: term(),
        }
    }

    #[tokio::test]
    async fn test_insert_or_ignore_natural_key() {
        let db = Database::in_memory().await.unwrap();
        let (room, subject) = seed(&db).await;
        let repo = SqliteScheduleRepository::new(db.pool().clone());

        let first = repo
            .insert_or_ignore(&monday_slot(subject, room, hm(8, 0), hm(9, 30)))
            .await
            .unwrap();
        let second = repo
            .insert_or_ignore(&monday_slot(subject, room, hm(10, 0), hm(11, 30)))
            .await
            .unwrap();

        assert!(first.is_some());
        assert!(second.is_none());

        let found = repo
            .find_for_subject(subject, room, Weekday::Mon, &term())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.start_time, hm(8, 0));
        assert_eq!(found.subject_code, "SUBJ101");
        assert_eq!(found.room_number, "R-101");
    }

    #[tokio::test]
    async fn test_find_by_room_and_start_uses_weekday() {
        let db = Database::in_memory().await.unwrap();
        let (room, subject) = seed(&db).await;
        let repo = SqliteScheduleRepository::new(db.pool().clone());
        repo.insert_or_ignore(&monday_slot(subject, room, hm(8, 0), hm(9, 30)))
            .await
            .unwrap();

        let monday = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2025, 3, 11).unwrap();

        assert!(repo
            .find_by_room_and_start("R-101", monday, hm(8, 0))
            .await
            .unwrap()
            .is_some());
        assert!(repo
            .find_by_room_and_start("R-101", tuesday, hm(8, 0))
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .find_by_room_and_start("R-101", monday, hm(8, 5))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_find_ended_splits_on_session() {
        let db = Database::in_memory().await.unwrap();
        let (room, subject) = seed(&db).await;
        let repo = SqliteScheduleRepository::new(db.pool().clone());
        let id = repo
            .insert_or_ignore(&monday_slot(subject, room, hm(8, 0), hm(9, 0)))
            .await
            .unwrap()
            .unwrap();

        let monday = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();

        let before_end = repo
            .find_ended_without_session(monday, hm(9, 0), &term())
            .await
            .unwrap();
        assert!(before_end.is_empty());

        let after_end = repo
            .find_ended_without_session(monday, hm(9, 1), &term())
            .await
            .unwrap();
        assert_eq!(after_end.len(), 1);
        assert_eq!(after_end[0].id, id);
        assert!(repo
            .find_ended_with_session(monday, hm(9, 1), &term())
            .await
            .unwrap()
            .is_empty());

        sqlx::query(
            "INSERT INTO sessions (schedule_id, session_date, status, started_at, ended_at) VALUES (?, '2025-03-10', 'ended', '2025-03-10 07:50:00', '2025-03-10 07:55:00')",
        )
        .bind(id)
        .execute(db.pool())
        .await
        .unwrap();

        assert!(repo
            .find_ended_without_session(monday, hm(9, 1), &term())
            .await
            .unwrap()
            .is_empty());
        let with_session = repo
            .find_ended_with_session(monday, hm(9, 1), &term())
            .await
            .unwrap();
        assert_eq!(with_session.len(), 1);
        assert_eq!(with_session[0].id, id);
    }
}

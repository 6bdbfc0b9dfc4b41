//! Transaction-scoped operations for multi-row writes.
//!
//! Each function takes an open SQLite transaction so a caller can group
//! several writes into one atomic unit. Two flows need this:
//!
//! - **Administrative schedules**: the five weekday slots for a room are
//!   created together or not at all.
//! - **Session start**: the starter's own record, the session row and the
//!   confirmation of every waiting early arrival commit as one.
//!
//! # Usage Pattern
//!
//! ```no_run
//! use rollcall_storage::{Database, DatabaseConfig};
//! use rollcall_storage::transaction;
//! use rollcall_core::{AcademicTerm, Semester};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("rollcall.db")).await?;
//! let term = AcademicTerm::new("2025-2026", Semester::First);
//!
//! let mut tx = db.pool().begin().await?;
//! transaction::create_admin_schedules(&mut tx, 1, 4, &term).await?;
//! tx.commit().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{StorageError, StorageResult};
use crate::models::{NewAttendanceRecord, Session};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rollcall_core::constants::{ADMIN_DAY_END, ADMIN_DAY_START};
use rollcall_core::{AcademicTerm, AttendanceStatus, SCHOOL_DAYS, day_name};
use sqlx::{Sqlite, Transaction};

/// Create the Monday-Friday all-day slots for an administrative subject in a room.
///
/// Existing slots are left untouched. Returns the number of rows inserted.
pub async fn create_admin_schedules(
    tx: &mut Transaction<'_, Sqlite>,
    subject_id: i64,
    room_id: i64,
    term: &AcademicTerm,
) -> StorageResult<u64> {
    let start = admin_time(ADMIN_DAY_START)?;
    let end = admin_time(ADMIN_DAY_END)?;
    let mut inserted = 0;

    for day in SCHOOL_DAYS {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO schedules
                (subject_id, room_id, instructor_id, day_of_week, start_time, end_time,
                 academic_year, semester)
            VALUES (?, ?, NULL, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(subject_id)
        .bind(room_id)
        .bind(day_name(day))
        .bind(start)
        .bind(end)
        .bind(&term.year)
        .bind(term.semester.as_str())
        .execute(&mut **tx)
        .await?;

        inserted += result.rows_affected();
    }

    Ok(inserted)
}

fn admin_time((hour, minute): (u32, u32)) -> StorageResult<NaiveTime> {
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
        StorageError::Configuration(format!("invalid administrative time {hour:02}:{minute:02}"))
    })
}

/// Insert a primary attendance record within a transaction.
///
/// Returns `None` when a primary record for the class day already exists.
pub async fn insert_primary(
    tx: &mut Transaction<'_, Sqlite>,
    record: &NewAttendanceRecord,
) -> StorageResult<Option<i64>> {
    let result = sqlx::query(
        r#"
        INSERT INTO attendance_records
            (user_id, schedule_id, session_id, scan_type, scan_time, scan_date,
             status, auth_method, location)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(record.user_id)
    .bind(record.schedule_id)
    .bind(record.session_id)
    .bind(record.scan_type.as_str())
    .bind(record.scan_time)
    .bind(record.scan_date)
    .bind(record.status.as_str())
    .bind(record.auth_method.as_str())
    .bind(record.location.as_str())
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    Ok(Some(result.last_insert_rowid()))
}

/// Start (or fetch) the session for a schedule on a date within a transaction
pub async fn start_session(
    tx: &mut Transaction<'_, Sqlite>,
    schedule_id: i64,
    date: NaiveDate,
    started_by: Option<i64>,
    started_at: NaiveDateTime,
) -> StorageResult<Session> {
    sqlx::query(
        r#"
        INSERT INTO sessions (schedule_id, session_date, status, started_by, started_at)
        VALUES (?, ?, 'active', ?, ?)
        ON CONFLICT (schedule_id, session_date) DO NOTHING
        "#,
    )
    .bind(schedule_id)
    .bind(date)
    .bind(started_by)
    .bind(started_at)
    .execute(&mut **tx)
    .await?;

    let session = sqlx::query_as::<_, Session>(
        r#"
        SELECT id, schedule_id, session_date, status, started_by, started_at, ended_at
        FROM sessions
        WHERE schedule_id = ? AND session_date = ?
        "#,
    )
    .bind(schedule_id)
    .bind(date)
    .fetch_one(&mut **tx)
    .await?;

    Ok(session)
}

/// Resolve all waiting records of a class day within a transaction
pub async fn confirm_awaiting(
    tx: &mut Transaction<'_, Sqlite>,
    schedule_id: i64,
    date: NaiveDate,
    status: AttendanceStatus,
    session_id: i64,
) -> StorageResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE attendance_records
        SET status = ?, session_id = ?, updated_at = datetime('now')
        WHERE schedule_id = ? AND scan_date = ? AND status = 'Awaiting Confirmation'
        "#,
    )
    .bind(status.as_str())
    .bind(session_id)
    .bind(schedule_id)
    .bind(date)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;
    use crate::repositories::{ScheduleRepository, SqliteScheduleRepository};
    use chrono::Weekday;
    use rollcall_core::{AuthMethod, ScanLocation, ScanType, Semester};

    fn term() -> AcademicTerm {
        AcademicTerm::new("2025-2026", Semester::First)
    }

    async fn seed_room_and_admin_subject(db: &Database) {
        sqlx::query("INSERT INTO rooms (room_number) VALUES ('ENG-2-04')")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query("INSERT INTO subjects (code, name) VALUES ('ADMIN-ACCESS', 'Administrative Access')")
            .execute(db.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_admin_schedules_created_once() {
        let db = Database::in_memory().await.unwrap();
        seed_room_and_admin_subject(&db).await;

        let mut tx = db.pool().begin().await.unwrap();
        assert_eq!(create_admin_schedules(&mut tx, 1, 1, &term()).await.unwrap(), 5);
        tx.commit().await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        assert_eq!(create_admin_schedules(&mut tx, 1, 1, &term()).await.unwrap(), 0);
        tx.commit().await.unwrap();

        let repo = SqliteScheduleRepository::new(db.pool().clone());
        let friday = repo
            .find_administrative(1, Weekday::Fri, &term())
            .await
            .unwrap()
            .unwrap();
        assert!(friday.is_administrative());
        assert_eq!(friday.end_time, NaiveTime::from_hms_opt(23, 59, 0).unwrap());
        assert!(repo
            .find_administrative(1, Weekday::Sat, &term())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_rollback_discards_admin_schedules() {
        let db = Database::in_memory().await.unwrap();
        seed_room_and_admin_subject(&db).await;

        let mut tx = db.pool().begin().await.unwrap();
        create_admin_schedules(&mut tx, 1, 1, &term()).await.unwrap();
        tx.rollback().await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schedules")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_session_start_confirms_waiting_records() {
        let db = Database::in_memory().await.unwrap();
        seed_room_and_admin_subject(&db).await;
        sqlx::query("INSERT INTO users (identifier, full_name, role) VALUES ('STU001', 'Ana', 'student')")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query(
            r#"
            INSERT INTO schedules
                (subject_id, room_id, day_of_week, start_time, end_time, academic_year, semester)
            VALUES (1, 1, 'Monday', '08:00:00', '09:00:00', '2025-2026', 'first')
            "#,
        )
        .execute(db.pool())
        .await
        .unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let waiting = NewAttendanceRecord {
            user_id: 1,
            schedule_id: Some(1),
            session_id: None,
            scan_type: ScanType::EarlyArrival,
            scan_time: date.and_hms_opt(7, 50, 0).unwrap(),
            scan_date: date,
            status: AttendanceStatus::AwaitingConfirmation,
            auth_method: AuthMethod::Rfid,
            location: ScanLocation::Outside,
        };

        let mut tx = db.pool().begin().await.unwrap();
        insert_primary(&mut tx, &waiting).await.unwrap().unwrap();
        assert!(insert_primary(&mut tx, &waiting).await.unwrap().is_none());
        let session = start_session(&mut tx, 1, date, None, date.and_hms_opt(8, 1, 0).unwrap())
            .await
            .unwrap();
        let confirmed = confirm_awaiting(&mut tx, 1, date, AttendanceStatus::Present, session.id)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(confirmed, 1);
        let (status, session_id): (String, Option<i64>) =
            sqlx::query_as("SELECT status, session_id FROM attendance_records WHERE id = 1")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(status, "Present");
        assert_eq!(session_id, Some(session.id));
    }
}

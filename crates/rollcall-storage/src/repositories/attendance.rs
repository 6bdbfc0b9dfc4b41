#![allow(async_fn_in_trait)]

use crate::error::StorageResult;
use crate::models::{AttendanceRecord, NewAttendanceRecord};
use chrono::NaiveDate;
use rollcall_core::AttendanceStatus;
use sqlx::SqlitePool;

/// Repository trait for attendance records.
///
/// Writes are compare-and-set: primary inserts lose cleanly against the
/// partial unique index and status updates only apply when the stored status
/// still matches what the caller read.
pub trait AttendanceRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> StorageResult<Option<AttendanceRecord>>;

    /// The primary (`time_in` / `early_arrival`) record for a class day
    async fn find_primary(
        &self,
        user_id: i64,
        schedule_id: i64,
        date: NaiveDate,
    ) -> StorageResult<Option<AttendanceRecord>>;

    /// Insert a primary record.
    ///
    /// Returns `None` if another primary record for the same class day
    /// already exists.
    async fn insert_primary(&self, record: &NewAttendanceRecord) -> StorageResult<Option<i64>>;

    /// Insert a record with no uniqueness requirement (`time_out`)
    async fn insert(&self, record: &NewAttendanceRecord) -> StorageResult<i64>;

    /// Move a record from `expected` to `status`.
    ///
    /// Returns `false` if the record no longer has status `expected`.
    async fn transition(
        &self,
        record_id: i64,
        expected: AttendanceStatus,
        status: AttendanceStatus,
        session_id: Option<i64>,
    ) -> StorageResult<bool>;

    /// Primary records of a user on a date, most recent first
    async fn find_primaries_for_user_on(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> StorageResult<Vec<AttendanceRecord>>;

    /// Records relevant to one class day's roster: everything tied to the
    /// schedule plus unmatched `time_out` scans on the same date.
    async fn find_for_roster(
        &self,
        schedule_id: i64,
        date: NaiveDate,
    ) -> StorageResult<Vec<AttendanceRecord>>;

    /// Resolve every `Awaiting Confirmation` record of a class day to `status`
    async fn confirm_awaiting(
        &self,
        schedule_id: i64,
        date: NaiveDate,
        status: AttendanceStatus,
        session_id: Option<i64>,
    ) -> StorageResult<u64>;
}

/// SQLite implementation of AttendanceRepository
pub struct SqliteAttendanceRepository {
    pool: SqlitePool,
}

impl SqliteAttendanceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl AttendanceRepository for SqliteAttendanceRepository {
    async fn find_by_id(&self, id: i64) -> StorageResult<Option<AttendanceRecord>> {
        let record = sqlx::query_as::<_, AttendanceRecord>(
            r#"
            SELECT id, user_id, schedule_id, session_id, scan_type, scan_time, scan_date,
                   status, auth_method, location, created_at, updated_at
            FROM attendance_records
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_primary(
        &self,
        user_id: i64,
        schedule_id: i64,
        date: NaiveDate,
    ) -> StorageResult<Option<AttendanceRecord>> {
        let record = sqlx::query_as::<_, AttendanceRecord>(
            r#"
            SELECT id, user_id, schedule_id, session_id, scan_type, scan_time, scan_date,
                   status, auth_method, location, created_at, updated_at
            FROM attendance_records
            WHERE user_id = ? AND schedule_id = ? AND scan_date = ?
              AND scan_type IN ('time_in', 'early_arrival')
            "#,
        )
        .bind(user_id)
        .bind(schedule_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn insert_primary(&self, record: &NewAttendanceRecord) -> StorageResult<Option<i64>> {
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
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(result.last_insert_rowid()))
    }

    async fn insert(&self, record: &NewAttendanceRecord) -> StorageResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance_records
                (user_id, schedule_id, session_id, scan_type, scan_time, scan_date,
                 status, auth_method, location)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
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
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn transition(
        &self,
        record_id: i64,
        expected: AttendanceStatus,
        status: AttendanceStatus,
        session_id: Option<i64>,
    ) -> StorageResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE attendance_records
            SET status = ?, session_id = COALESCE(?, session_id), updated_at = datetime('now')
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(status.as_str())
        .bind(session_id)
        .bind(record_id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_primaries_for_user_on(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> StorageResult<Vec<AttendanceRecord>> {
        let records = sqlx::query_as::<_, AttendanceRecord>(
            r#"
            SELECT id, user_id, schedule_id, session_id, scan_type, scan_time, scan_date,
                   status, auth_method, location, created_at, updated_at
            FROM attendance_records
            WHERE user_id = ? AND scan_date = ?
              AND scan_type IN ('time_in', 'early_arrival')
            ORDER BY scan_time DESC, id DESC
            "#,
        )
        .bind(user_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn find_for_roster(
        &self,
        schedule_id: i64,
        date: NaiveDate,
    ) -> StorageResult<Vec<AttendanceRecord>> {
        let records = sqlx::query_as::<_, AttendanceRecord>(
            r#"
            SELECT id, user_id, schedule_id, session_id, scan_type, scan_time, scan_date,
                   status, auth_method, location, created_at, updated_at
            FROM attendance_records
            WHERE scan_date = ?
              AND (schedule_id = ? OR (schedule_id IS NULL AND scan_type = 'time_out'))
            ORDER BY scan_time, id
            "#,
        )
        .bind(date)
        .bind(schedule_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn confirm_awaiting(
        &self,
        schedule_id: i64,
        date: NaiveDate,
        status: AttendanceStatus,
        session_id: Option<i64>,
    ) -> StorageResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE attendance_records
            SET status = ?, session_id = COALESCE(?, session_id), updated_at = datetime('now')
            WHERE schedule_id = ? AND scan_date = ? AND status = 'Awaiting Confirmation'
            "#,
        )
        .bind(status.as_str())
        .bind(session_id)
        .bind(schedule_id)
        .bind(date)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;
    use rollcall_core::{AuthMethod, ScanLocation, ScanType};

    async fn seed(db: &Database) {
        sqlx::query("INSERT INTO users (identifier, full_name, role) VALUES ('STU001', 'Ana', 'student')")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query("INSERT INTO rooms (room_number) VALUES ('R-101')")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query("INSERT INTO subjects (code, name) VALUES ('SUBJ101', 'Intro')")
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
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn record(scan_type: ScanType, status: AttendanceStatus, h: u32, m: u32) -> NewAttendanceRecord {
        NewAttendanceRecord {
            user_id: 1,
            schedule_id: Some(1),
            session_id: None,
            scan_type,
            scan_time: monday().and_hms_opt(h, m, 0).unwrap(),
            scan_date: monday(),
            status,
            auth_method: AuthMethod::Rfid,
            location: ScanLocation::Outside,
        }
    }

    #[tokio::test]
    async fn test_second_primary_insert_is_rejected() {
        let db = Database::in_memory().await.unwrap();
        seed(&db).await;
        let repo = SqliteAttendanceRepository::new(db.pool().clone());

        let first = repo
            .insert_primary(&record(ScanType::EarlyArrival, AttendanceStatus::AwaitingConfirmation, 7, 50))
            .await
            .unwrap();
        let second = repo
            .insert_primary(&record(ScanType::TimeIn, AttendanceStatus::Present, 8, 1))
            .await
            .unwrap();

        assert!(first.is_some());
        assert!(second.is_none());

        let stored = repo.find_primary(1, 1, monday()).await.unwrap().unwrap();
        assert_eq!(stored.status, "Awaiting Confirmation");
    }

    #[tokio::test]
    async fn test_time_outs_are_unlimited() {
        let db = Database::in_memory().await.unwrap();
        seed(&db).await;
        let repo = SqliteAttendanceRepository::new(db.pool().clone());

        repo.insert(&record(ScanType::TimeOut, AttendanceStatus::Present, 8, 30)).await.unwrap();
        repo.insert(&record(ScanType::TimeOut, AttendanceStatus::Present, 8, 45)).await.unwrap();

        let all = repo.find_for_roster(1, monday()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].scan_time, monday().and_hms_opt(8, 45, 0).unwrap());
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let db = Database::in_memory().await.unwrap();
        seed(&db).await;
        let repo = SqliteAttendanceRepository::new(db.pool().clone());

        let id = repo
            .insert_primary(&record(ScanType::EarlyArrival, AttendanceStatus::AwaitingConfirmation, 7, 50))
            .await
            .unwrap()
            .unwrap();

        assert!(repo
            .transition(id, AttendanceStatus::AwaitingConfirmation, AttendanceStatus::Present, None)
            .await
            .unwrap());
        assert!(!repo
            .transition(id, AttendanceStatus::AwaitingConfirmation, AttendanceStatus::Late, None)
            .await
            .unwrap());

        let stored = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.status().unwrap(), AttendanceStatus::Present);
        assert_eq!(stored.scan_type().unwrap(), ScanType::EarlyArrival);
    }

    #[tokio::test]
    async fn test_confirm_awaiting_only_touches_provisional() {
        let db = Database::in_memory().await.unwrap();
        seed(&db).await;
        sqlx::query("INSERT INTO users (identifier, full_name, role) VALUES ('STU002', 'Ben', 'student')")
            .execute(db.pool())
            .await
            .unwrap();
        let repo = SqliteAttendanceRepository::new(db.pool().clone());

        repo.insert_primary(&record(ScanType::EarlyArrival, AttendanceStatus::AwaitingConfirmation, 7, 50))
            .await
            .unwrap();
        let mut late = record(ScanType::TimeIn, AttendanceStatus::Late, 8, 20);
        late.user_id = 2;
        repo.insert_primary(&late).await.unwrap();

        let updated = repo
            .confirm_awaiting(1, monday(), AttendanceStatus::Present, None)
            .await
            .unwrap();
        assert_eq!(updated, 1);

        let ben = repo.find_primary(2, 1, monday()).await.unwrap().unwrap();
        assert_eq!(ben.status, "Late");
    }

    #[tokio::test]
    async fn test_find_primaries_most_recent_first() {
        let db = Database::in_memory().await.unwrap();
        seed(&db).await;
        sqlx::query(
            r#"
            INSERT INTO schedules
                (subject_id, room_id, day_of_week, start_time, end_time, academic_year, semester)
            VALUES (1, 1, 'Monday', '10:00:00', '11:00:00', '2025-2026', 'second')
            "#,
        )
        .execute(db.pool())
        .await
        .unwrap();
        let repo = SqliteAttendanceRepository::new(db.pool().clone());

        repo.insert_primary(&record(ScanType::TimeIn, AttendanceStatus::Present, 8, 0)).await.unwrap();
        let mut later = record(ScanType::TimeIn, AttendanceStatus::Present, 10, 0);
        later.schedule_id = Some(2);
        repo.insert_primary(&later).await.unwrap();

        let primaries = repo.find_primaries_for_user_on(1, monday()).await.unwrap();
        assert_eq!(primaries.len(), 2);
        assert_eq!(primaries[0].schedule_id, Some(2));
    }
}

#![allow(async_fn_in_trait)]

use crate::error::{StorageError, StorageResult};
use crate::models::Session;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::SqlitePool;

/// Repository trait for class sessions.
pub trait SessionRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> StorageResult<Option<Session>>;

    /// The session of `schedule_id` on `date`, active or ended
    async fn find_for_date(&self, schedule_id: i64, date: NaiveDate)
    -> StorageResult<Option<Session>>;

    /// Start the session for (schedule, date), or return the existing one.
    async fn start(
        &self,
        schedule_id: i64,
        date: NaiveDate,
        started_by: Option<i64>,
        started_at: NaiveDateTime,
    ) -> StorageResult<Session>;

    /// Mark an active session ended. Returns `false` if it was not active.
    async fn end(&self, session_id: i64, ended_at: NaiveDateTime) -> StorageResult<bool>;
}

/// SQLite implementation of SessionRepository
pub struct SqliteSessionRepository {
    pool: SqlitePool,
}

impl SqliteSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl SessionRepository for SqliteSessionRepository {
    async fn find_by_id(&self, id: i64) -> StorageResult<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, schedule_id, session_date, status, started_by, started_at, ended_at
            FROM sessions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn find_for_date(
        &self,
        schedule_id: i64,
        date: NaiveDate,
    ) -> StorageResult<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, schedule_id, session_date, status, started_by, started_at, ended_at
            FROM sessions
            WHERE schedule_id = ? AND session_date = ?
            "#,
        )
        .bind(schedule_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn start(
        &self,
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
        .execute(&self.pool)
        .await?;

        self.find_for_date(schedule_id, date)
            .await?
            .ok_or_else(|| StorageError::not_found("Session", "schedule_id", schedule_id))
    }

    async fn end(&self, session_id: i64, ended_at: NaiveDateTime) -> StorageResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET status = 'ended', ended_at = ?
            WHERE id = ? AND status = 'active'
            "#,
        )
        .bind(ended_at)
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

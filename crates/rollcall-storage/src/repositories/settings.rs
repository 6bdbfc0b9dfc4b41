#![allow(async_fn_in_trait)]

use crate::error::{StorageError, StorageResult};
use chrono::Duration;
use rollcall_core::constants::{DEFAULT_EARLY_ARRIVAL_MINUTES, DEFAULT_LATE_THRESHOLD_MINUTES};
use rollcall_core::{AcademicTerm, AttendancePolicy};
use sqlx::SqlitePool;

pub const KEY_ACADEMIC_YEAR: &str = "academic_year";
pub const KEY_SEMESTER: &str = "semester";
pub const KEY_EARLY_ARRIVAL_MINUTES: &str = "early_arrival_window_minutes";
pub const KEY_LATE_THRESHOLD_MINUTES: &str = "late_threshold_minutes";

/// Key/value settings table.
///
/// The current term and attendance policy are read on every operation, so an
/// administrator changing them takes effect on the next scan.
pub trait SettingsRepository: Send + Sync {
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Current academic year and semester
    async fn current_term(&self) -> StorageResult<AcademicTerm> {
        let year = self
            .get(KEY_ACADEMIC_YEAR)
            .await?
            .ok_or_else(|| StorageError::not_found("Setting", "key", KEY_ACADEMIC_YEAR))?;
        let semester = self
            .get(KEY_SEMESTER)
            .await?
            .ok_or_else(|| StorageError::not_found("Setting", "key", KEY_SEMESTER))?;

        Ok(AcademicTerm::new(year, semester.parse()?))
    }

    /// Early-arrival window and late threshold; missing keys fall back to defaults
    async fn attendance_policy(&self) -> StorageResult<AttendancePolicy> {
        let early = minutes(
            KEY_EARLY_ARRIVAL_MINUTES,
            self.get(KEY_EARLY_ARRIVAL_MINUTES).await?,
            DEFAULT_EARLY_ARRIVAL_MINUTES,
        )?;
        let late = minutes(
            KEY_LATE_THRESHOLD_MINUTES,
            self.get(KEY_LATE_THRESHOLD_MINUTES).await?,
            DEFAULT_LATE_THRESHOLD_MINUTES,
        )?;

        Ok(AttendancePolicy {
            early_arrival_window: Duration::minutes(early),
            late_threshold: Duration::minutes(late),
        })
    }
}

fn minutes(key: &str, value: Option<String>, default: i64) -> StorageResult<i64> {
    match value {
        None => Ok(default),
        Some(v) => match v.trim().parse::<i64>() {
            Ok(m) if m >= 0 => Ok(m),
            _ => Err(StorageError::Validation(format!(
                "setting {key} must be a non-negative number of minutes, got {v:?}"
            ))),
        },
    }
}

/// SQLite implementation of SettingsRepository
pub struct SqliteSettingsRepository {
    pool: SqlitePool,
}

impl SqliteSettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl SettingsRepository for SqliteSettingsRepository {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let value: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value.map(|(v,)| v))
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES (?, ?)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#![allow(async_fn_in_trait)]

use crate::error::StorageResult;
use chrono::{Duration, NaiveDateTime};
use sqlx::SqlitePool;

/// Named, expiring leases so only one process runs a periodic job.
pub trait LeaseRepository: Send + Sync {
    /// Take or renew the lease `name` for `holder` until `now + ttl`.
    ///
    /// Succeeds if the lease is free, expired, or already held by `holder`.
    async fn try_acquire(
        &self,
        name: &str,
        holder: &str,
        now: NaiveDateTime,
        ttl: Duration,
    ) -> StorageResult<bool>;

    /// Give up the lease if `holder` still owns it
    async fn release(&self, name: &str, holder: &str) -> StorageResult<bool>;
}

/// SQLite implementation of LeaseRepository
pub struct SqliteLeaseRepository {
    pool: SqlitePool,
}

impl SqliteLeaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl LeaseRepository for SqliteLeaseRepository {
    async fn try_acquire(
        &self,
        name: &str,
        holder: &str,
        now: NaiveDateTime,
        ttl: Duration,
    ) -> StorageResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO worker_leases (name, holder, expires_at) VALUES (?, ?, ?)
            ON CONFLICT (name) DO UPDATE
                SET holder = excluded.holder, expires_at = excluded.expires_at
                WHERE worker_leases.holder = excluded.holder
                   OR worker_leases.expires_at <= ?
            "#,
        )
        .bind(name)
        .bind(holder)
        .bind(now + ttl)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, name: &str, holder: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM worker_leases WHERE name = ? AND holder = ?")
            .bind(name)
            .bind(holder)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

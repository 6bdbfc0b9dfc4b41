#![allow(async_fn_in_trait)]

use crate::error::StorageResult;
use crate::models::Room;
use sqlx::SqlitePool;

/// Repository trait for rooms
pub trait RoomRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> StorageResult<Option<Room>>;

    /// Exact match on the printed room number
    async fn find_by_number(&self, room_number: &str) -> StorageResult<Option<Room>>;

    async fn create(
        &self,
        room_number: &str,
        name: Option<&str>,
        lock_address: Option<&str>,
    ) -> StorageResult<i64>;
}

/// SQLite implementation of RoomRepository
pub struct SqliteRoomRepository {
    pool: SqlitePool,
}

impl SqliteRoomRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl RoomRepository for SqliteRoomRepository {
    async fn find_by_id(&self, id: i64) -> StorageResult<Option<Room>> {
        let room = sqlx::query_as::<_, Room>(
            "SELECT id, room_number, name, lock_address, created_at FROM rooms WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(room)
    }

    async fn find_by_number(&self, room_number: &str) -> StorageResult<Option<Room>> {
        let room = sqlx::query_as::<_, Room>(
            "SELECT id, room_number, name, lock_address, created_at FROM rooms WHERE room_number = ?",
        )
        .bind(room_number.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(room)
    }

    async fn create(
        &self,
        room_number: &str,
        name: Option<&str>,
        lock_address: Option<&str>,
    ) -> StorageResult<i64> {
        let result =
            sqlx::query("INSERT INTO rooms (room_number, name, lock_address) VALUES (?, ?, ?)")
                .bind(room_number.trim())
                .bind(name)
                .bind(lock_address)
                .execute(&self.pool)
                .await?;

        Ok(result.last_insert_rowid())
    }
}

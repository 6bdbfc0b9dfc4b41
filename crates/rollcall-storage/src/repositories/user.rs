#![allow(async_fn_in_trait)]

use crate::error::{StorageError, StorageResult};
use crate::models::User;
use sqlx::SqlitePool;

/// Read access to the user directory.
///
/// Users are owned by an external user-management collaborator; the engine
/// only needs lookups. `create` and `set_active` exist for provisioning and tests.
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> StorageResult<Option<User>>;

    /// Find a user by RFID tag / institutional number
    async fn find_by_identifier(&self, identifier: &str) -> StorageResult<Option<User>>;

    /// Find a user by enrolled fingerprint slot
    async fn find_by_fingerprint(&self, fingerprint_id: i64) -> StorageResult<Option<User>>;

    /// Insert a user and return its row id
    async fn create(&self, user: &User) -> StorageResult<i64>;

    /// Activate or deactivate a user
    async fn set_active(&self, id: i64, active: bool) -> StorageResult<()>;
}

/// User directory backed by the `users` table.
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl UserRepository for SqliteUserRepository {
    async fn find_by_id(&self, id: i64) -> StorageResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, identifier, fingerprint_id, full_name, role, active,
                   created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_identifier(&self, identifier: &str) -> StorageResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, identifier, fingerprint_id, full_name, role, active,
                   created_at, updated_at
            FROM users
            WHERE identifier = ?
            "#,
        )
        .bind(identifier.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_fingerprint(&self, fingerprint_id: i64) -> StorageResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, identifier, fingerprint_id, full_name, role, active,
                   created_at, updated_at
            FROM users
            WHERE fingerprint_id = ?
            "#,
        )
        .bind(fingerprint_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create(&self, user: &User) -> StorageResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (identifier, fingerprint_id, full_name, role, active)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.identifier)
        .bind(user.fingerprint_id)
        .bind(&user.full_name)
        .bind(&user.role)
        .bind(user.active)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn set_active(&self, id: i64, active: bool) -> StorageResult<()> {
        let result =
            sqlx::query("UPDATE users SET active = ?, updated_at = datetime('now') WHERE id = ?")
                .bind(active)
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("User", "id", id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;
    use chrono::Utc;

    async fn setup_test_db() -> Database {
        Database::in_memory().await.unwrap()
    }

    fn create_test_user(identifier: &str, role: &str) -> User {
        User {
            id: 0,
            identifier: identifier.to_string(),
            fingerprint_id: None,
            full_name: "Test User".to_string(),
            role: role.to_string(),
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_find_by_identifier() {
        let db = setup_test_db().await;
        let repo = SqliteUserRepository::new(db.pool().clone());

        let id = repo.create(&create_test_user("STU001", "student")).await.unwrap();
        assert!(id > 0);

        let found = repo.find_by_identifier(" STU001 ").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.role, "student");
    }

    #[tokio::test]
    async fn test_find_by_fingerprint() {
        let db = setup_test_db().await;
        let repo = SqliteUserRepository::new(db.pool().clone());

        let mut user = create_test_user("INS001", "instructor");
        user.fingerprint_id = Some(17);
        let id = repo.create(&user).await.unwrap();

        let found = repo.find_by_fingerprint(17).await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert!(repo.find_by_fingerprint(18).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_identifier_rejected() {
        let db = setup_test_db().await;
        let repo = SqliteUserRepository::new(db.pool().clone());

        repo.create(&create_test_user("DUP001", "student")).await.unwrap();
        let err = repo
            .create(&create_test_user("DUP001", "student"))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_invalid_role_rejected_by_schema() {
        let db = setup_test_db().await;
        let repo = SqliteUserRepository::new(db.pool().clone());

        assert!(repo.create(&create_test_user("X001", "visitor")).await.is_err());
    }

    #[tokio::test]
    async fn test_set_active() {
        let db = setup_test_db().await;
        let repo = SqliteUserRepository::new(db.pool().clone());

        let id = repo.create(&create_test_user("STU002", "student")).await.unwrap();
        repo.set_active(id, false).await.unwrap();

        let found = repo.find_by_id(id).await.unwrap().unwrap();
        assert!(!found.active);

        assert!(matches!(
            repo.set_active(9999, true).await,
            Err(StorageError::NotFound { .. })
        ));
    }
}

#![allow(async_fn_in_trait)]

use crate::error::{StorageError, StorageResult};
use crate::models::Subject;
use sqlx::SqlitePool;

/// Repository trait for subjects
pub trait SubjectRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> StorageResult<Option<Subject>>;

    async fn find_by_code(&self, code: &str) -> StorageResult<Option<Subject>>;

    async fn create(&self, code: &str, name: &str) -> StorageResult<i64>;

    /// Return the subject with `code`, inserting it first if missing.
    ///
    /// Concurrent callers converge on the same row.
    async fn get_or_create(&self, code: &str, name: &str) -> StorageResult<Subject>;
}

/// SQLite implementation of SubjectRepository
pub struct SqliteSubjectRepository {
    pool: SqlitePool,
}

impl SqliteSubjectRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl SubjectRepository for SqliteSubjectRepository {
    async fn find_by_id(&self, id: i64) -> StorageResult<Option<Subject>> {
        let subject = sqlx::query_as::<_, Subject>(
            "SELECT id, code, name, created_at FROM subjects WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subject)
    }

    async fn find_by_code(&self, code: &str) -> StorageResult<Option<Subject>> {
        let subject = sqlx::query_as::<_, Subject>(
            "SELECT id, code, name, created_at FROM subjects WHERE code = ?",
        )
        .bind(code.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(subject)
    }

    async fn create(&self, code: &str, name: &str) -> StorageResult<i64> {
        let result = sqlx::query("INSERT INTO subjects (code, name) VALUES (?, ?)")
            .bind(code.trim())
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(result.last_insert_rowid())
    }

    async fn get_or_create(&self, code: &str, name: &str) -> StorageResult<Subject> {
        sqlx::query("INSERT OR IGNORE INTO subjects (code, name) VALUES (?, ?)")
            .bind(code.trim())
            .bind(name)
            .execute(&self.pool)
            .await?;

        self.find_by_code(code)
            .await?
            .ok_or_else(|| StorageError::not_found("Subject", "code", code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        let repo = SqliteSubjectRepository::new(db.pool().clone());

        let first = repo.get_or_create("ADMIN-ACCESS", "Administrative Access").await.unwrap();
        let second = repo.get_or_create("ADMIN-ACCESS", "ignored").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Administrative Access");
        assert!(second.is_administrative());
    }

    #[tokio::test]
    async fn test_find_by_code() {
        let db = Database::in_memory().await.unwrap();
        let repo = SqliteSubjectRepository::new(db.pool().clone());

        let id = repo.create("SUBJ101", "Intro to Computing").await.unwrap();
        assert_eq!(repo.find_by_code("SUBJ101").await.unwrap().unwrap().id, id);
        assert!(repo.find_by_code("SUBJ999").await.unwrap().is_none());
        assert!(repo.find_by_id(id).await.unwrap().is_some());
    }
}

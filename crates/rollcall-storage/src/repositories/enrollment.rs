#![allow(async_fn_in_trait)]

use crate::error::StorageResult;
use crate::models::User;
use rollcall_core::AcademicTerm;
use sqlx::SqlitePool;

/// Repository trait for subject enrollments.
pub trait EnrollmentRepository: Send + Sync {
    /// Returns `true` if the user is actively enrolled in the subject for the term
    async fn is_enrolled(
        &self,
        user_id: i64,
        subject_id: i64,
        term: &AcademicTerm,
    ) -> StorageResult<bool>;

    /// Enrolled, active students of a subject ordered by name
    async fn enrolled_students(
        &self,
        subject_id: i64,
        term: &AcademicTerm,
    ) -> StorageResult<Vec<User>>;

    async fn enroll(&self, user_id: i64, subject_id: i64, term: &AcademicTerm)
    -> StorageResult<i64>;

    /// Returns `false` if there was no active enrollment to drop
    async fn drop_enrollment(
        &self,
        user_id: i64,
        subject_id: i64,
        term: &AcademicTerm,
    ) -> StorageResult<bool>;
}

/// SQLite implementation of EnrollmentRepository
pub struct SqliteEnrollmentRepository {
    pool: SqlitePool,
}

impl SqliteEnrollmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl EnrollmentRepository for SqliteEnrollmentRepository {
    async fn is_enrolled(
        &self,
        user_id: i64,
        subject_id: i64,
        term: &AcademicTerm,
    ) -> StorageResult<bool> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM enrollments
            WHERE user_id = ? AND subject_id = ?
              AND academic_year = ? AND semester = ? AND status = 'enrolled'
            "#,
        )
        .bind(user_id)
        .bind(subject_id)
        .bind(&term.year)
        .bind(term.semester.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn enrolled_students(
        &self,
        subject_id: i64,
        term: &AcademicTerm,
    ) -> StorageResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.identifier, u.fingerprint_id, u.full_name, u.role, u.active,
                   u.created_at, u.updated_at
            FROM enrollments e
            JOIN users u ON u.id = e.user_id
            WHERE e.subject_id = ? AND e.academic_year = ? AND e.semester = ?
              AND e.status = 'enrolled' AND u.role = 'student' AND u.active = 1
            ORDER BY u.full_name, u.id
            "#,
        )
        .bind(subject_id)
        .bind(&term.year)
        .bind(term.semester.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn enroll(
        &self,
        user_id: i64,
        subject_id: i64,
        term: &AcademicTerm,
    ) -> StorageResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO enrollments (user_id, subject_id, academic_year, semester, status)
            VALUES (?, ?, ?, ?, 'enrolled')
            ON CONFLICT (user_id, subject_id, academic_year, semester)
            DO UPDATE SET status = 'enrolled'
            "#,
        )
        .bind(user_id)
        .bind(subject_id)
        .bind(&term.year)
        .bind(term.semester.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn drop_enrollment(
        &self,
        user_id: i64,
        subject_id: i64,
        term: &AcademicTerm,
    ) -> StorageResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE enrollments SET status = 'dropped'
            WHERE user_id = ? AND subject_id = ?
              AND academic_year = ? AND semester = ? AND status = 'enrolled'
            "#,
        )
        .bind(user_id)
        .bind(subject_id)
        .bind(&term.year)
        .bind(term.semester.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;
    use rollcall_core::Semester;

    async fn seed(db: &Database) {
        for (identifier, name, role) in [
            ("STU002", "Zed Cruz", "student"),
            ("STU001", "Ana Reyes", "student"),
            ("INS001", "Prof. Santos", "instructor"),
        ] {
            sqlx::query("INSERT INTO users (identifier, full_name, role) VALUES (?, ?, ?)")
                .bind(identifier)
                .bind(name)
                .bind(role)
                .execute(db.pool())
                .await
                .unwrap();
        }
        sqlx::query("INSERT INTO subjects (code, name) VALUES ('SUBJ101', 'Intro')")
            .execute(db.pool())
            .await
            .unwrap();
    }

    fn term() -> AcademicTerm {
        AcademicTerm::new("2025-2026", Semester::First)
    }

    #[tokio::test]
    async fn test_enroll_and_check() {
        let db = Database::in_memory().await.unwrap();
        seed(&db).await;
        let repo = SqliteEnrollmentRepository::new(db.pool().clone());

        repo.enroll(1, 1, &term()).await.unwrap();
        assert!(repo.is_enrolled(1, 1, &term()).await.unwrap());
        assert!(!repo.is_enrolled(2, 1, &term()).await.unwrap());

        let other_term = AcademicTerm::new("2025-2026", Semester::Second);
        assert!(!repo.is_enrolled(1, 1, &other_term).await.unwrap());
    }

    #[tokio::test]
    async fn test_dropped_student_is_not_enrolled() {
        let db = Database::in_memory().await.unwrap();
        seed(&db).await;
        let repo = SqliteEnrollmentRepository::new(db.pool().clone());

        repo.enroll(1, 1, &term()).await.unwrap();
        assert!(repo.drop_enrollment(1, 1, &term()).await.unwrap());
        assert!(!repo.is_enrolled(1, 1, &term()).await.unwrap());
        assert!(!repo.drop_enrollment(1, 1, &term()).await.unwrap());

        repo.enroll(1, 1, &term()).await.unwrap();
        assert!(repo.is_enrolled(1, 1, &term()).await.unwrap());
    }

    #[tokio::test]
    async fn test_enrolled_students_sorted_and_students_only() {
        let db = Database::in_memory().await.unwrap();
        seed(&db).await;
        let repo = SqliteEnrollmentRepository::new(db.pool().clone());

        for user_id in [1, 2, 3] {
            repo.enroll(user_id, 1, &term()).await.unwrap();
        }

        let names: Vec<String> = repo
            .enrolled_students(1, &term())
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.full_name)
            .collect();
        assert_eq!(names, vec!["Ana Reyes", "Zed Cruz"]);
    }
}

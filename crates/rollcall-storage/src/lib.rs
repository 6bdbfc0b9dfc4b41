//! Storage layer for the Rollcall attendance engine.
//!
//! This crate provides SQLite-backed persistence for users, rooms, subjects,
//! weekly schedules, class sessions, enrollments and attendance records,
//! plus the settings table that carries the current term and attendance
//! policy.
//!
//! # Architecture
//!
//! - [`Database`] - connection pool manager with embedded migrations
//! - [`repositories`] - one trait + SQLite implementation per table
//! - [`transaction`] - multi-row writes that must commit together
//!
//! # Concurrency
//!
//! Several door readers may submit scans for the same person at the same
//! time. The schema carries the invariants so that no reader has to hold a
//! lock while it classifies:
//!
//! - a partial unique index allows one `time_in` / `early_arrival` record per
//!   user, schedule and date; inserts use `ON CONFLICT DO NOTHING` and report
//!   a lost race as `None`
//! - status changes are conditional on the status the caller read
//! - schedules and sessions have natural unique keys, so get-or-create is an
//!   `INSERT OR IGNORE` followed by a read
//!
//! # Example
//!
//! ```no_run
//! use rollcall_storage::{Database, DatabaseConfig};
//! use rollcall_storage::repositories::{SettingsRepository, SqliteSettingsRepository};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("rollcall.db")).await?;
//! let settings = SqliteSettingsRepository::new(db.pool().clone());
//!
//! let term = settings.current_term().await?;
//! let policy = settings.attendance_policy().await?;
//! println!("{term}: late after {} min", policy.late_threshold.num_minutes());
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod models;
pub mod repositories;
pub mod transaction;

pub use connection::{Database, DatabaseConfig};
pub use error::{StorageError, StorageResult};
pub use models::{
    AttendanceRecord, Enrollment, NewAttendanceRecord, NewSchedule, Room, Schedule, Session,
    SessionStatus, Subject, User,
};
pub use repositories::{
    AttendanceRepository, EnrollmentRepository, LeaseRepository, RoomRepository,
    ScheduleRepository, SessionRepository, SettingsRepository, SqliteAttendanceRepository,
    SqliteEnrollmentRepository, SqliteLeaseRepository, SqliteRoomRepository,
    SqliteScheduleRepository, SqliteSessionRepository, SqliteSettingsRepository,
    SqliteSubjectRepository, SqliteUserRepository, SubjectRepository, UserRepository,
};

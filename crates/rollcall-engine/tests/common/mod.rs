//! Shared fixture for engine integration tests.
//!
//! Seeds one campus on Monday 2025-03-10 (first semester, 2025-2026):
//!
//! | identifier | role       | notes                          |
//! |------------|------------|--------------------------------|
//! | `INS001`   | instructor | owns CS101 in R-101            |
//! | `STU001`   | student    | enrolled in CS101, fingerprint 7 |
//! | `STU002`   | student    | enrolled in CS101              |
//! | `STU003`   | student    | not enrolled                   |
//! | `CUS001`   | custodian  |                                |
//! | `DEAN01`   | dean       |                                |
//! | `OLD001`   | student    | inactive                       |
//!
//! CS101 meets Mondays 08:00-09:00 in R-101 (which has a lock) and
//! CS201 meets Mondays 10:00-11:30 in R-101 (owned by nobody).
//! R-202 has no lock and no classes.

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use rollcall_core::{AcademicTerm, FixedClock, ScanLocation, Semester};
use rollcall_engine::{AttendanceService, Credential, ScanRequest};
use rollcall_network::{LockDispatcher, MockDoorLock};
use rollcall_storage::repositories::{
    EnrollmentRepository, RoomRepository, ScheduleRepository, SqliteEnrollmentRepository,
    SqliteRoomRepository, SqliteScheduleRepository, SqliteSubjectRepository, SubjectRepository,
};
use rollcall_storage::{Database, NewSchedule};
use std::sync::Arc;
use std::time::Duration;

pub const LOCKED_ROOM: &str = "R-101";
pub const LOCK_ADDRESS: &str = "10.0.0.21:8080";

pub struct Campus {
    pub db: Database,
    pub clock: Arc<FixedClock>,
    pub doors: LockDispatcher<MockDoorLock>,
    pub service: AttendanceService<MockDoorLock>,
    pub room: i64,
    pub unlocked_room: i64,
    pub cs101: i64,
    pub cs201: i64,
    pub cs101_schedule: i64,
    pub cs201_schedule: i64,
}

pub fn term() -> AcademicTerm {
    AcademicTerm::new("2025-2026", Semester::First)
}

pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
}

pub fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn at(h: u32, m: u32) -> NaiveDateTime {
    monday().and_time(hm(h, m))
}

pub fn rfid(identifier: &str) -> Credential {
    Credential::Rfid(identifier.to_string())
}

impl Campus {
    pub async fn in_memory() -> Self {
        Self::seed(Database::in_memory().await.unwrap()).await
    }

    pub async fn seed(db: Database) -> Self {
        let pool = db.pool().clone();

        for (identifier, fingerprint, name, role, active) in [
            ("INS001", None, "Prof. Santos", "instructor", true),
            ("STU001", Some(7), "Ana Reyes", "student", true),
            ("STU002", None, "Ben Cruz", "student", true),
            ("STU003", None, "Carla Dizon", "student", true),
            ("CUS001", None, "Dante Lim", "custodian", true),
            ("DEAN01", None, "Dean Ramos", "dean", true),
            ("OLD001", None, "Old Student", "student", false),
        ] {
            sqlx::query(
                "INSERT INTO users (identifier, fingerprint_id, full_name, role, active) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(identifier)
            .bind(fingerprint)
            .bind(name)
            .bind(role)
            .bind(active)
            .execute(&pool)
            .await
            .unwrap();
        }
        let instructor = user_id(&db, "INS001").await;

        let rooms = SqliteRoomRepository::new(pool.clone());
        let room = rooms
            .create(LOCKED_ROOM, Some("Lecture Hall"), Some(LOCK_ADDRESS))
            .await
            .unwrap();
        let unlocked_room = rooms.create("R-202", None, None).await.unwrap();

        let subjects = SqliteSubjectRepository::new(pool.clone());
        let cs101 = subjects.create("CS101", "Intro to Computing").await.unwrap();
        let cs201 = subjects.create("CS201", "Data Structures").await.unwrap();

        let schedules = SqliteScheduleRepository::new(pool.clone());
        let cs101_schedule = schedules
            .insert_or_ignore(&NewSchedule {
                subject_id: cs101,
                room_id: room,
                instructor_id: Some(instructor),
                day: Weekday::Mon,
                start_time: hm(8, 0),
                end_time: hm(9, 0),
                term: term(),
            })
            .await
            .unwrap()
            .unwrap();
        let cs201_schedule = schedules
            .insert_or_ignore(&NewSchedule {
                subject_id: cs201,
                room_id: room,
                instructor_id: None,
                day: Weekday::Mon,
                start_time: hm(10, 0),
                end_time: hm(11, 30),
                term: term(),
            })
            .await
            .unwrap()
            .unwrap();

        let enrollments = SqliteEnrollmentRepository::new(pool.clone());
        for identifier in ["STU001", "STU002"] {
            let id = user_id(&db, identifier).await;
            enrollments.enroll(id, cs101, &term()).await.unwrap();
        }

        let clock = Arc::new(FixedClock::new(at(7, 0)));
        let doors = LockDispatcher::new(MockDoorLock::new(), Duration::from_secs(1));
        let service = AttendanceService::new(pool, clock.clone(), Some(doors.clone()));

        Self {
            db,
            clock,
            doors,
            service,
            room,
            unlocked_room,
            cs101,
            cs201,
            cs101_schedule,
            cs201_schedule,
        }
    }

    pub fn scan(&self, identifier: &str) -> ScanRequest {
        ScanRequest {
            credential: rfid(identifier),
            room_id: self.room,
            subject_id: None,
            location: ScanLocation::Outside,
        }
    }

    pub fn leave(&self, identifier: &str) -> ScanRequest {
        ScanRequest {
            location: ScanLocation::Inside,
            ..self.scan(identifier)
        }
    }

    pub async fn status_of(&self, record_id: i64) -> String {
        let (status,): (String,) = sqlx::query_as("SELECT status FROM attendance_records WHERE id = ?")
            .bind(record_id)
            .fetch_one(self.db.pool())
            .await
            .unwrap();
        status
    }
}

pub async fn user_id(db: &Database, identifier: &str) -> i64 {
    let (id,): (i64,) = sqlx::query_as("SELECT id FROM users WHERE identifier = ?")
        .bind(identifier)
        .fetch_one(db.pool())
        .await
        .unwrap();
    id
}

//! Roster aggregation: one row per enrolled student for a class day.
//!
//! Read-only. Students without a primary record are reported `Absent`; that
//! status is computed here and never written.

use crate::error::AttendanceResult;
use crate::resolver::Resolution;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rollcall_core::{AttendanceStatus, ScanType, SessionKey};
use rollcall_storage::repositories::{
    AttendanceRepository, EnrollmentRepository, SqliteAttendanceRepository,
    SqliteEnrollmentRepository, SqliteUserRepository, UserRepository,
};
use rollcall_storage::AttendanceRecord;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterRow {
    pub user_id: i64,
    pub identifier: String,
    pub full_name: String,
    pub status: AttendanceStatus,
    pub sign_in: Option<NaiveDateTime>,
    pub sign_out: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RosterStats {
    /// `Present` or `Early Arrival`
    pub present: usize,
    pub late: usize,
    pub absent: usize,
    pub total: usize,
}

/// The schedule owner's own attendance for the class day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstructorAttendance {
    pub user_id: i64,
    pub full_name: Option<String>,
    pub status: AttendanceStatus,
    pub sign_in: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Roster {
    pub session_key: String,
    pub schedule_id: i64,
    pub subject_code: String,
    pub subject_name: String,
    pub room: String,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// `active`, `ended`, or absent when no session was started
    pub session_status: Option<String>,
    pub rows: Vec<RosterRow>,
    pub stats: RosterStats,
    pub instructor: Option<InstructorAttendance>,
}

/// Builds rosters from enrollments and attendance records.
pub struct RosterAggregator {
    attendance: SqliteAttendanceRepository,
    enrollments: SqliteEnrollmentRepository,
    users: SqliteUserRepository,
}

impl RosterAggregator {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            attendance: SqliteAttendanceRepository::new(pool.clone()),
            enrollments: SqliteEnrollmentRepository::new(pool.clone()),
            users: SqliteUserRepository::new(pool),
        }
    }

    pub async fn build(&self, resolution: &Resolution) -> AttendanceResult<Roster> {
        let schedule = &resolution.schedule;
        let date = resolution.window.date;
        let term = schedule.term()?;

        let students = self.enrollments.enrolled_students(schedule.subject_id, &term).await?;
        let records = self.attendance.find_for_roster(schedule.id, date).await?;

        let mut rows = Vec::with_capacity(students.len());
        for student in students {
            let day = summarize(&records, student.id, schedule.id)?;
            rows.push(RosterRow {
                user_id: student.id,
                identifier: student.identifier,
                full_name: student.full_name,
                status: day.status,
                sign_in: day.sign_in,
                sign_out: day.sign_out,
            });
        }

        let stats = tally(&rows);

        let instructor = match schedule.instructor_id {
            Some(instructor_id) => {
                let day = summarize(&records, instructor_id, schedule.id)?;
                let full_name = self.users.find_by_id(instructor_id).await?.map(|u| u.full_name);
                Some(InstructorAttendance {
                    user_id: instructor_id,
                    full_name,
                    status: day.status,
                    sign_in: day.sign_in,
                })
            }
            None => None,
        };

        let session_key = SessionKey::new(date, schedule.room_number.clone(), schedule.start_time)?;
        debug!(
            "Built roster {} with {} rows ({} present, {} late, {} absent)",
            session_key,
            rows.len(),
            stats.present,
            stats.late,
            stats.absent
        );

        Ok(Roster {
            session_key: session_key.to_string(),
            schedule_id: schedule.id,
            subject_code: schedule.subject_code.clone(),
            subject_name: schedule.subject_name.clone(),
            room: schedule.room_number.clone(),
            date,
            start: schedule.start_time,
            end: schedule.end_time,
            session_status: resolution.session.as_ref().map(|s| s.status.clone()),
            rows,
            stats,
            instructor,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DaySummary {
    status: AttendanceStatus,
    sign_in: Option<NaiveDateTime>,
    sign_out: Option<NaiveDateTime>,
}

/// Merge one user's records for a class day into status, sign-in and sign-out.
fn summarize(
    records: &[AttendanceRecord],
    user_id: i64,
    schedule_id: i64,
) -> AttendanceResult<DaySummary> {
    let mut primaries = Vec::new();
    let mut departures = Vec::new();

    for record in records.iter().filter(|r| r.user_id == user_id) {
        match record.scan_type()? {
            ScanType::TimeOut => departures.push(record),
            _ if record.schedule_id == Some(schedule_id) => primaries.push(record),
            _ => {}
        }
    }

    let status = match primaries.iter().max_by_key(|r| (r.scan_time, r.id)) {
        Some(latest) if latest.scan_type()? == ScanType::EarlyArrival => {
            AttendanceStatus::EarlyArrival
        }
        Some(latest) => latest.status()?,
        None => AttendanceStatus::Absent,
    };

    let earliest = |kind: ScanType| {
        primaries
            .iter()
            .filter(|r| r.scan_type == kind.as_str())
            .map(|r| r.scan_time)
            .min()
    };
    let sign_in = earliest(ScanType::EarlyArrival).or_else(|| earliest(ScanType::TimeIn));

    let sign_out = departures
        .iter()
        .filter(|r| match r.schedule_id {
            Some(id) => id == schedule_id,
            None => sign_in.is_some_and(|signed_in| r.scan_time > signed_in),
        })
        .map(|r| r.scan_time)
        .max();

    Ok(DaySummary {
        status,
        sign_in,
        sign_out,
    })
}

fn tally(rows: &[RosterRow]) -> RosterStats {
    let mut stats = RosterStats {
        total: rows.len(),
        ..RosterStats::default()
    };

    for row in rows {
        match row.status {
            AttendanceStatus::Late => stats.late += 1,
            AttendanceStatus::Absent => stats.absent += 1,
            s if s.is_present_equivalent() => stats.present += 1,
            _ => {}
        }
    }

    stats
}

//! Attendance store: the write path for classified scans.
//!
//! Each primary scan is read-classify-write against the partial unique index
//! on `(user, schedule, date)`. A writer that loses the race re-reads and
//! classifies once more before reporting `Conflict`, so two readers scanning
//! the same card at the same instant produce one record and one conflict.

use crate::error::{AttendanceError, AttendanceResult};
use crate::messages::Messages;
use crate::resolver::Resolution;
use chrono::NaiveDateTime;
use rollcall_core::classifier::{self, confirmation_status};
use rollcall_core::policy::truncate_to_minute;
use rollcall_core::{
    AttendancePolicy, AttendanceStatus, AuthMethod, Decision, EntryPoint, ExistingRecord,
    Rejection, Role, ScanContext, ScanLocation, ScanType,
};
use rollcall_storage::repositories::{
    AttendanceRepository, ScheduleRepository, SessionRepository, SqliteAttendanceRepository,
    SqliteScheduleRepository, SqliteSessionRepository,
};
use rollcall_storage::{AttendanceRecord, NewAttendanceRecord, Schedule, User, transaction};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

/// Attempts at the read-classify-write cycle before giving up with `Conflict`.
const WRITE_ATTEMPTS: usize = 2;

/// One classified primary scan to persist.
#[derive(Debug, Clone, Copy)]
pub struct PrimaryScan<'a> {
    pub user: &'a User,
    pub role: Role,
    pub resolution: &'a Resolution,
    pub scan_time: NaiveDateTime,
    pub auth_method: AuthMethod,
    pub entry: EntryPoint,
    pub policy: &'a AttendancePolicy,
}

/// One departure scan to persist.
#[derive(Debug, Clone, Copy)]
pub struct DepartureScan<'a> {
    pub user: &'a User,
    pub role: Role,
    /// Schedule the scan resolved to, if any
    pub preferred_schedule: Option<i64>,
    pub scan_time: NaiveDateTime,
    pub auth_method: AuthMethod,
}

/// What the store wrote.
#[derive(Debug, Clone, Serialize)]
pub struct RecordOutcome {
    pub record_id: i64,
    pub status: AttendanceStatus,
    pub scan_type: ScanType,
    pub scan_time: NaiveDateTime,
    pub schedule_id: Option<i64>,

    /// This scan started the class session
    pub session_started: bool,

    /// This scan ended the class session
    pub session_ended: bool,
}

/// Idempotent attendance writer.
pub struct AttendanceStore {
    pool: SqlitePool,
    attendance: SqliteAttendanceRepository,
    sessions: SqliteSessionRepository,
    schedules: SqliteScheduleRepository,
}

impl AttendanceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            attendance: SqliteAttendanceRepository::new(pool.clone()),
            sessions: SqliteSessionRepository::new(pool.clone()),
            schedules: SqliteScheduleRepository::new(pool.clone()),
            pool,
        }
    }

    /// Record a time-in family scan.
    ///
    /// # Errors
    ///
    /// - `Conflict` if a blocking primary record exists for the class day
    /// - `TooEarly` / `NotFound` for early-arrival scans outside the window
    pub async fn record_primary(&self, scan: &PrimaryScan<'_>) -> AttendanceResult<RecordOutcome> {
        let resolution = scan.resolution;
        let schedule = &resolution.schedule;
        let date = resolution.window.date;
        let scan_time = truncate_to_minute(scan.scan_time);

        let mut last_seen = None;

        for attempt in 0..WRITE_ATTEMPTS {
            let session = self.sessions.find_for_date(schedule.id, date).await?;
            let session_started = session.is_some();

            let ctx = ScanContext {
                role: scan.role,
                window: resolution.window,
                administrative: resolution.is_administrative(),
                scan_time,
                location: ScanLocation::Outside,
                entry: scan.entry,
                session_started,
            };

            let stored = self.attendance.find_primary(scan.user.id, schedule.id, date).await?;
            let existing = stored.as_ref().map(existing_record).transpose()?;
            last_seen = existing.map(|e| e.status);

            let decision = classifier::decide(&ctx, scan.policy, existing.as_ref())
                .map_err(|rejection| rejection_error(rejection, scan.user, schedule))?;

            let written = match decision {
                Decision::Insert(classification) => {
                    let mut status = classification.status;
                    if status.is_provisional() && session_started {
                        status = confirmation_status(&resolution.window, scan.policy, scan_time);
                    }

                    let record = NewAttendanceRecord {
                        user_id: scan.user.id,
                        schedule_id: Some(schedule.id),
                        session_id: session.as_ref().map(|s| s.id),
                        scan_type: classification.scan_type,
                        scan_time,
                        scan_date: date,
                        status,
                        auth_method: scan.auth_method,
                        location: ScanLocation::Outside,
                    };

                    if self.starts_session(scan, schedule) {
                        self.insert_and_start_session(scan, &record).await?
                    } else {
                        self.insert_primary(scan, &record).await?
                    }
                }
                Decision::Confirm { record_id, status } => {
                    let expected = existing
                        .map(|e| e.status)
                        .unwrap_or(AttendanceStatus::AwaitingConfirmation);
                    let session_id = session.as_ref().map(|s| s.id);

                    if self
                        .attendance
                        .transition(record_id, expected, status, session_id)
                        .await?
                    {
                        info!(
                            "Confirmed record {} for {} as {}",
                            record_id, scan.user.identifier, status
                        );
                        Some(RecordOutcome {
                            record_id,
                            status,
                            scan_type: existing.map(|e| e.scan_type).unwrap_or(ScanType::TimeIn),
                            scan_time,
                            schedule_id: Some(schedule.id),
                            session_started: false,
                            session_ended: false,
                        })
                    } else {
                        None
                    }
                }
            };

            if let Some(outcome) = written {
                return Ok(outcome);
            }

            debug!(
                "Lost write race for {} on schedule {} (attempt {})",
                scan.user.identifier,
                schedule.id,
                attempt + 1
            );
        }

        let existing = match self.attendance.find_primary(scan.user.id, schedule.id, date).await? {
            Some(record) => record.status()?,
            None => last_seen.unwrap_or(AttendanceStatus::AwaitingConfirmation),
        };
        warn!(
            "Giving up on scan for {} on schedule {}: {}",
            scan.user.identifier, schedule.id, existing
        );
        Err(AttendanceError::Conflict { existing })
    }

    /// Record a departure (`time_out`) scan.
    ///
    /// The record is attached to the user's most recent sign-in today,
    /// preferring `preferred_schedule`, or to no schedule if there is none.
    /// An owner leaving ends the class session.
    pub async fn record_departure(&self, scan: &DepartureScan<'_>) -> AttendanceResult<RecordOutcome> {
        let scan_time = truncate_to_minute(scan.scan_time);
        let date = scan_time.date();

        let primaries = self
            .attendance
            .find_primaries_for_user_on(scan.user.id, date)
            .await?;
        let matched = match_sign_in(&primaries, scan.preferred_schedule);

        let schedule_id = matched.and_then(|r| r.schedule_id);
        let session = match schedule_id {
            Some(id) => self.sessions.find_for_date(id, date).await?,
            None => None,
        };

        let record_id = self
            .attendance
            .insert(&NewAttendanceRecord {
                user_id: scan.user.id,
                schedule_id,
                session_id: session.as_ref().map(|s| s.id),
                scan_type: ScanType::TimeOut,
                scan_time,
                scan_date: date,
                status: AttendanceStatus::Present,
                auth_method: scan.auth_method,
                location: ScanLocation::Inside,
            })
            .await?;

        info!(
            "Recorded time_out {} for {} (schedule {:?})",
            record_id, scan.user.identifier, schedule_id
        );

        let mut session_ended = false;
        if let (Some(session), Some(schedule_id)) = (session, schedule_id)
            && session.is_active()
            && scan.role.starts_sessions()
        {
            let owned = self
                .schedules
                .find_by_id(schedule_id)
                .await?
                .is_some_and(|s| s.is_owned_by(scan.user.id));
            if owned {
                session_ended = self.sessions.end(session.id, scan_time).await?;
                if session_ended {
                    info!("Session {} ended by {}", session.id, scan.user.identifier);
                }
            }
        }

        Ok(RecordOutcome {
            record_id,
            status: AttendanceStatus::Present,
            scan_type: ScanType::TimeOut,
            scan_time,
            schedule_id,
            session_started: false,
            session_ended,
        })
    }

    fn starts_session(&self, scan: &PrimaryScan<'_>, schedule: &Schedule) -> bool {
        scan.role.starts_sessions()
            && !schedule.is_administrative()
            && schedule.is_owned_by(scan.user.id)
    }

    async fn insert_primary(
        &self,
        scan: &PrimaryScan<'_>,
        record: &NewAttendanceRecord,
    ) -> AttendanceResult<Option<RecordOutcome>> {
        let Some(record_id) = self.attendance.insert_primary(record).await? else {
            return Ok(None);
        };

        info!(
            "Recorded {} {} for {} on schedule {:?}",
            record.scan_type, record.status, scan.user.identifier, record.schedule_id
        );

        let mut status = record.status;
        if status.is_provisional() {
            status = self.settle_if_session_started(scan, record_id).await?;
        }

        Ok(Some(RecordOutcome {
            record_id,
            status,
            scan_type: record.scan_type,
            scan_time: record.scan_time,
            schedule_id: record.schedule_id,
            session_started: false,
            session_ended: false,
        }))
    }

    /// A session may have started (or even ended) between classification and
    /// insert; the session start would have missed this record, so confirm it here.
    async fn settle_if_session_started(
        &self,
        scan: &PrimaryScan<'_>,
        record_id: i64,
    ) -> AttendanceResult<AttendanceStatus> {
        let window = &scan.resolution.window;
        let Some(session) = self
            .sessions
            .find_for_date(scan.resolution.schedule.id, window.date)
            .await?
        else {
            return Ok(AttendanceStatus::AwaitingConfirmation);
        };

        let status = confirmation_status(window, scan.policy, session.started_at);
        self.attendance
            .transition(
                record_id,
                AttendanceStatus::AwaitingConfirmation,
                status,
                Some(session.id),
            )
            .await?;
        Ok(status)
    }

    async fn insert_and_start_session(
        &self,
        scan: &PrimaryScan<'_>,
        record: &NewAttendanceRecord,
    ) -> AttendanceResult<Option<RecordOutcome>> {
        let resolution = scan.resolution;
        let date = resolution.window.date;
        let mut tx = self.pool.begin().await?;

        let session = transaction::start_session(
            &mut tx,
            resolution.schedule.id,
            date,
            Some(scan.user.id),
            record.scan_time,
        )
        .await?;

        let record = NewAttendanceRecord {
            session_id: Some(session.id),
            ..record.clone()
        };
        let Some(record_id) = transaction::insert_primary(&mut tx, &record).await? else {
            return Ok(None);
        };

        let confirmed_as = confirmation_status(&resolution.window, scan.policy, session.started_at);
        let confirmed = transaction::confirm_awaiting(
            &mut tx,
            resolution.schedule.id,
            date,
            confirmed_as,
            session.id,
        )
        .await?;

        tx.commit().await?;

        info!(
            "Session {} started by {} for {} ({} waiting records confirmed as {})",
            session.id,
            scan.user.identifier,
            resolution.schedule.subject_code,
            confirmed,
            confirmed_as
        );

        Ok(Some(RecordOutcome {
            record_id,
            status: record.status,
            scan_type: record.scan_type,
            scan_time: record.scan_time,
            schedule_id: record.schedule_id,
            session_started: true,
            session_ended: false,
        }))
    }
}

fn existing_record(record: &AttendanceRecord) -> AttendanceResult<ExistingRecord> {
    Ok(ExistingRecord {
        id: record.id,
        scan_type: record.scan_type()?,
        status: record.status()?,
    })
}

fn rejection_error(rejection: Rejection, user: &User, schedule: &Schedule) -> AttendanceError {
    match rejection {
        Rejection::Conflict { existing } => {
            debug!(
                "Duplicate scan by {} for {}: already {}",
                user.identifier, schedule.subject_code, existing
            );
            AttendanceError::Conflict { existing }
        }
        Rejection::TooEarly { opens_at } => AttendanceError::TooEarly { opens_at },
        Rejection::AlreadyStarted => AttendanceError::not_found(Messages::NO_UPCOMING_CLASS),
    }
}

/// Most recent sign-in on the preferred schedule, else the most recent on any.
///
/// `primaries` must be ordered most recent first.
fn match_sign_in(
    primaries: &[AttendanceRecord],
    preferred_schedule: Option<i64>,
) -> Option<&AttendanceRecord> {
    preferred_schedule
        .and_then(|id| primaries.iter().find(|r| r.schedule_id == Some(id)))
        .or_else(|| primaries.first())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn primary(id: i64, schedule_id: i64, h: u32) -> AttendanceRecord {
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        AttendanceRecord {
            id,
            user_id: 1,
            schedule_id: Some(schedule_id),
            session_id: None,
            scan_type: "time_in".to_string(),
            scan_time: date.and_hms_opt(h, 0, 0).unwrap(),
            scan_date: date,
            status: "Present".to_string(),
            auth_method: "rfid".to_string(),
            location: "outside".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_match_sign_in_prefers_schedule() {
        let primaries = vec![primary(2, 20, 10), primary(1, 10, 8)];

        assert_eq!(match_sign_in(&primaries, Some(10)).map(|r| r.id), Some(1));
        assert_eq!(match_sign_in(&primaries, Some(99)).map(|r| r.id), Some(2));
        assert_eq!(match_sign_in(&primaries, None).map(|r| r.id), Some(2));
        assert!(match_sign_in(&[], Some(10)).is_none());
    }
}

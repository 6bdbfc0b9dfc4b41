//! Attendance classifier.
//!
//! A pure function from (role, schedule window, policy, scan time, existing
//! record) to a typed [`Decision`]. It never touches storage: the caller reads
//! the existing primary record, asks for a decision, and applies it
//! atomically.
//!
//! # Rules (in priority order)
//!
//! 1. Administrative schedule → `Present`, `time_in`.
//! 2. Early-arrival entry point and scan before `start - early` → [`Rejection::TooEarly`].
//! 3. Student scan in `[start - early, start)` → `Awaiting Confirmation`, `early_arrival`.
//! 4. Scan in `[start, start + late)` → `Present`.
//! 5. Scan at or after `start + late` → `Late`.
//!
//! Instructors, admins and deans on their own schedule never wait for a
//! confirmation: anything before `start + late` is `Present` for them.
//!
//! # State transitions
//!
//! ```text
//! NoRecord ──scan──> Present | Late | AwaitingConfirmation
//! AwaitingConfirmation ──session started──> Present | Late
//! AwaitingConfirmation ──sweep (no session, class ended)──> Present
//! ```

use crate::policy::{AttendancePolicy, ScheduleWindow, truncate_to_minute};
use crate::types::{AttendanceStatus, Role, ScanLocation, ScanType};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Which external operation produced the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryPoint {
    /// Regular door scan.
    Submit,
    /// Student-only "I am here before class" scan.
    EarlyArrival,
}

/// Everything the classifier needs to know about one scan.
#[derive(Debug, Clone, Copy)]
pub struct ScanContext {
    pub role: Role,
    pub window: ScheduleWindow,
    /// The resolved schedule is a synthetic administrative one.
    pub administrative: bool,
    pub scan_time: NaiveDateTime,
    pub location: ScanLocation,
    pub entry: EntryPoint,
    /// A session was started for the schedule on this date, whether or not it
    /// has ended since.
    pub session_started: bool,
}

/// The primary record already stored for (user, schedule, date).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExistingRecord {
    pub id: i64,
    pub scan_type: ScanType,
    pub status: AttendanceStatus,
}

/// Status and scan type for a record about to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub status: AttendanceStatus,
    pub scan_type: ScanType,
}

/// What the store should do with a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Insert a new record.
    Insert(Classification),
    /// Move an existing provisional record to a terminal status.
    Confirm {
        record_id: i64,
        status: AttendanceStatus,
    },
}

/// Reasons a scan produces no write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Early-arrival scan before the window opens.
    TooEarly { opens_at: NaiveDateTime },
    /// Early-arrival scan for a class that has already started.
    AlreadyStarted,
    /// A primary record already exists for this class day.
    Conflict { existing: AttendanceStatus },
}

/// Decide what a scan means.
///
/// # Errors
/// Returns a [`Rejection`] when the scan must not be written.
///
/// # Examples
///
/// ```
/// use rollcall_core::{
///     AttendancePolicy, AttendanceStatus, Decision, EntryPoint, Role, ScanContext,
///     ScanLocation, ScanType, ScheduleWindow, classifier,
/// };
/// use chrono::{NaiveDate, NaiveTime};
///
/// let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
/// let window = ScheduleWindow::new(
///     date,
///     NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
///     NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
/// ).unwrap();
///
/// let ctx = ScanContext {
///     role: Role::Student,
///     window,
///     administrative: false,
///     scan_time: date.and_hms_opt(8, 20, 0).unwrap(),
///     location: ScanLocation::Outside,
///     entry: EntryPoint::Submit,
///     session_started: false,
/// };
///
/// let decision = classifier::decide(&ctx, &AttendancePolicy::default(), None).unwrap();
/// match decision {
///     Decision::Insert(c) => {
///         assert_eq!(c.status, AttendanceStatus::Late);
///         assert_eq!(c.scan_type, ScanType::TimeIn);
///     }
///     _ => unreachable!(),
/// }
/// ```
pub fn decide(
    ctx: &ScanContext,
    policy: &AttendancePolicy,
    existing: Option<&ExistingRecord>,
) -> Result<Decision, Rejection> {
    if ctx.location.is_departure() && ctx.entry == EntryPoint::Submit {
        return Ok(Decision::Insert(Classification {
            status: AttendanceStatus::Present,
            scan_type: ScanType::TimeOut,
        }));
    }

    let fresh = classify(ctx, policy)?;

    match existing {
        None => Ok(Decision::Insert(fresh)),
        Some(record) if record.status.is_provisional() && ctx.session_started => {
            Ok(Decision::Confirm {
                record_id: record.id,
                status: confirmation_status(&ctx.window, policy, ctx.scan_time),
            })
        }
        Some(record) if record.status.blocks_new_primary() => Err(Rejection::Conflict {
            existing: record.status,
        }),
        Some(record) => Ok(Decision::Confirm {
            record_id: record.id,
            status: fresh.status,
        }),
    }
}

/// Classify a primary (time-in family) scan with no regard for existing records.
///
/// # Errors
/// Returns [`Rejection::TooEarly`] or [`Rejection::AlreadyStarted`] for
/// early-arrival scans outside the early window.
pub fn classify(ctx: &ScanContext, policy: &AttendancePolicy) -> Result<Classification, Rejection> {
    if ctx.administrative {
        return Ok(Classification {
            status: AttendanceStatus::Present,
            scan_type: ScanType::TimeIn,
        });
    }

    let at = truncate_to_minute(ctx.scan_time);
    let start = ctx.window.starts_at();
    let early_opens = ctx.window.early_opens_at(policy);
    let late_from = ctx.window.late_from(policy);

    if ctx.entry == EntryPoint::EarlyArrival {
        if at < early_opens {
            return Err(Rejection::TooEarly {
                opens_at: early_opens,
            });
        }
        if at >= start {
            return Err(Rejection::AlreadyStarted);
        }
    }

    if at < start && ctx.role == Role::Student {
        return Ok(Classification {
            status: AttendanceStatus::AwaitingConfirmation,
            scan_type: ScanType::EarlyArrival,
        });
    }

    let status = if at < late_from {
        AttendanceStatus::Present
    } else {
        AttendanceStatus::Late
    };

    Ok(Classification {
        status,
        scan_type: ScanType::TimeIn,
    })
}

/// Terminal status for a provisional record confirmed at `confirmed_at`.
///
/// Confirmation before `start + late` is `Present`; at or after it, `Late`.
#[must_use]
pub fn confirmation_status(
    window: &ScheduleWindow,
    policy: &AttendancePolicy,
    confirmed_at: NaiveDateTime,
) -> AttendanceStatus {
    if truncate_to_minute(confirmed_at) < window.late_from(policy) {
        AttendanceStatus::Present
    } else {
        AttendanceStatus::Late
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use rstest::rstest;

    fn window() -> ScheduleWindow {
        ScheduleWindow::new(
            NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn ctx(role: Role, scan_time: NaiveDateTime) -> ScanContext {
        ScanContext {
            role,
            window: window(),
            administrative: false,
            scan_time,
            location: ScanLocation::Outside,
            entry: EntryPoint::Submit,
            session_started: false,
        }
    }

    fn insert_of(decision: Decision) -> Classification {
        match decision {
            Decision::Insert(c) => c,
            other => panic!("expected insert, got {other:?}"),
        }
    }

    #[rstest]
    #[case(7, 45, AttendanceStatus::AwaitingConfirmation, ScanType::EarlyArrival)]
    #[case(7, 58, AttendanceStatus::AwaitingConfirmation, ScanType::EarlyArrival)]
    #[case(8, 0, AttendanceStatus::Present, ScanType::TimeIn)]
    #[case(8, 14, AttendanceStatus::Present, ScanType::TimeIn)]
    #[case(8, 15, AttendanceStatus::Late, ScanType::TimeIn)]
    #[case(8, 20, AttendanceStatus::Late, ScanType::TimeIn)]
    #[case(9, 0, AttendanceStatus::Late, ScanType::TimeIn)]
    fn test_student_submit_windows(
        #[case] h: u32,
        #[case] m: u32,
        #[case] status: AttendanceStatus,
        #[case] scan_type: ScanType,
    ) {
        let c = insert_of(decide(&ctx(Role::Student, at(h, m)), &AttendancePolicy::default(), None).unwrap());
        assert_eq!(c.status, status);
        assert_eq!(c.scan_type, scan_type);
    }

    #[test]
    fn test_seconds_do_not_cross_late_boundary() {
        let scan = NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(8, 14, 59)
            .unwrap();
        let c = insert_of(decide(&ctx(Role::Student, scan), &AttendancePolicy::default(), None).unwrap());
        assert_eq!(c.status, AttendanceStatus::Present);
    }

    #[rstest]
    #[case(Role::Instructor)]
    #[case(Role::Admin)]
    #[case(Role::Dean)]
    fn test_staff_early_scan_is_present(#[case] role: Role) {
        let c = insert_of(decide(&ctx(role, at(7, 50)), &AttendancePolicy::default(), None).unwrap());
        assert_eq!(c.status, AttendanceStatus::Present);
        assert_eq!(c.scan_type, ScanType::TimeIn);
    }

    #[test]
    fn test_instructor_late() {
        let c = insert_of(decide(&ctx(Role::Instructor, at(8, 30)), &AttendancePolicy::default(), None).unwrap());
        assert_eq!(c.status, AttendanceStatus::Late);
    }

    #[rstest]
    #[case(0, 1)]
    #[case(14, 0)]
    #[case(23, 59)]
    fn test_administrative_always_present(#[case] h: u32, #[case] m: u32) {
        let mut c = ctx(Role::Custodian, at(h, m));
        c.administrative = true;
        let result = insert_of(decide(&c, &AttendancePolicy::default(), None).unwrap());
        assert_eq!(result.status, AttendanceStatus::Present);
        assert_eq!(result.scan_type, ScanType::TimeIn);
    }

    #[test]
    fn test_early_arrival_too_early() {
        let mut c = ctx(Role::Student, at(7, 44));
        c.entry = EntryPoint::EarlyArrival;
        assert_eq!(
            classify(&c, &AttendancePolicy::default()),
            Err(Rejection::TooEarly { opens_at: at(7, 45) })
        );
    }

    #[test]
    fn test_early_arrival_after_start() {
        let mut c = ctx(Role::Student, at(8, 0));
        c.entry = EntryPoint::EarlyArrival;
        assert_eq!(
            classify(&c, &AttendancePolicy::default()),
            Err(Rejection::AlreadyStarted)
        );
    }

    #[test]
    fn test_early_arrival_inside_window() {
        let mut c = ctx(Role::Student, at(7, 45));
        c.entry = EntryPoint::EarlyArrival;
        let result = classify(&c, &AttendancePolicy::default()).unwrap();
        assert_eq!(result.status, AttendanceStatus::AwaitingConfirmation);
        assert_eq!(result.scan_type, ScanType::EarlyArrival);
    }

    #[test]
    fn test_conflict_reports_existing_status() {
        let existing = ExistingRecord {
            id: 7,
            scan_type: ScanType::EarlyArrival,
            status: AttendanceStatus::AwaitingConfirmation,
        };
        let result = decide(&ctx(Role::Student, at(8, 5)), &AttendancePolicy::default(), Some(&existing));
        assert_eq!(
            result,
            Err(Rejection::Conflict {
                existing: AttendanceStatus::AwaitingConfirmation
            })
        );
    }

    #[rstest]
    #[case(8, 5, AttendanceStatus::Present)]
    #[case(8, 15, AttendanceStatus::Late)]
    fn test_confirmation_once_session_started(
        #[case] h: u32,
        #[case] m: u32,
        #[case] expected: AttendanceStatus,
    ) {
        let existing = ExistingRecord {
            id: 7,
            scan_type: ScanType::EarlyArrival,
            status: AttendanceStatus::AwaitingConfirmation,
        };
        let mut c = ctx(Role::Student, at(h, m));
        c.session_started = true;
        assert_eq!(
            decide(&c, &AttendancePolicy::default(), Some(&existing)),
            Ok(Decision::Confirm {
                record_id: 7,
                status: expected
            })
        );
    }

    #[test]
    fn test_terminal_record_conflicts_even_with_session() {
        let existing = ExistingRecord {
            id: 3,
            scan_type: ScanType::TimeIn,
            status: AttendanceStatus::Present,
        };
        let mut c = ctx(Role::Student, at(8, 30));
        c.session_started = true;
        assert_eq!(
            decide(&c, &AttendancePolicy::default(), Some(&existing)),
            Err(Rejection::Conflict {
                existing: AttendanceStatus::Present
            })
        );
    }

    #[test]
    fn test_absent_record_is_overwritten() {
        let existing = ExistingRecord {
            id: 9,
            scan_type: ScanType::TimeIn,
            status: AttendanceStatus::Absent,
        };
        assert_eq!(
            decide(&ctx(Role::Student, at(8, 1)), &AttendancePolicy::default(), Some(&existing)),
            Ok(Decision::Confirm {
                record_id: 9,
                status: AttendanceStatus::Present
            })
        );
    }

    #[test]
    fn test_departure_is_additive_time_out() {
        let existing = ExistingRecord {
            id: 1,
            scan_type: ScanType::TimeIn,
            status: AttendanceStatus::Present,
        };
        let mut c = ctx(Role::Student, at(9, 2));
        c.location = ScanLocation::Inside;
        let c = insert_of(decide(&c, &AttendancePolicy::default(), Some(&existing)).unwrap());
        assert_eq!(c.scan_type, ScanType::TimeOut);
    }

    #[test]
    fn test_custom_policy_shifts_boundaries() {
        let policy = AttendancePolicy::from_minutes(30, 5);
        let c = insert_of(decide(&ctx(Role::Student, at(7, 30)), &policy, None).unwrap());
        assert_eq!(c.status, AttendanceStatus::AwaitingConfirmation);
        let c = insert_of(decide(&ctx(Role::Student, at(8, 5)), &policy, None).unwrap());
        assert_eq!(c.status, AttendanceStatus::Late);
    }

    #[test]
    fn test_confirmation_status_boundary() {
        let policy = AttendancePolicy::default();
        assert_eq!(confirmation_status(&window(), &policy, at(8, 14)), AttendanceStatus::Present);
        assert_eq!(confirmation_status(&window(), &policy, at(8, 15)), AttendanceStatus::Late);
        assert_eq!(confirmation_status(&window(), &policy, at(7, 50)), AttendanceStatus::Present);
    }
}

//! Schedule resolution: which class does a scan belong to?
//!
//! A scan carries a room, a time and sometimes an explicit subject. The
//! resolver turns that into one [`Schedule`] occurrence, creating schedules
//! on demand where availability beats strict pre-registration:
//!
//! - an explicit subject with no slot in the room today gets a default
//!   90-minute slot starting at the scan minute
//! - custodians, and deans outside their own classes, get the room's
//!   administrative all-day schedule, created for Monday-Friday on first use;
//!   a subject on a custodian scan is ignored
//!
//! Departures use [`ScheduleResolver::lookup`], which never creates anything.
//!
//! Which lookups run is decided once per scan by [`ResolutionStrategy`].

use crate::error::{AttendanceError, AttendanceResult};
use crate::messages::Messages;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use rollcall_core::constants::{
    ADMIN_SUBJECT_CODE, ADMIN_SUBJECT_NAME, DEFAULT_CLASS_DURATION_MINUTES,
};
use rollcall_core::policy::truncate_to_minute;
use rollcall_core::{AcademicTerm, AttendancePolicy, Role, ScheduleWindow, SessionKey};
use rollcall_storage::repositories::{
    EnrollmentRepository, ScheduleRepository, SessionRepository, SqliteEnrollmentRepository,
    SqliteScheduleRepository, SqliteSessionRepository, SqliteSubjectRepository,
    SubjectRepository,
};
use rollcall_storage::{NewSchedule, Room, Schedule, Session, User, transaction};
use sqlx::SqlitePool;
use tracing::{debug, info};

/// How a role finds its schedule. Selected once from the role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    /// Students: the class with an active session in the room, else the class
    /// whose window contains the scan. Enrollment is required.
    Enrolled,

    /// Instructors and admins: their own class now, else the class with an
    /// active session in the room.
    Owner,

    /// Custodians: the room's administrative schedule.
    Administrative,

    /// Deans: their own class now, else the administrative schedule.
    OwnerOrAdministrative,
}

impl ResolutionStrategy {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Student => Self::Enrolled,
            Role::Instructor | Role::Admin => Self::Owner,
            Role::Custodian => Self::Administrative,
            Role::Dean => Self::OwnerOrAdministrative,
        }
    }
}

/// Inputs for resolving one scan.
#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    pub user: &'a User,
    pub role: Role,
    pub room: &'a Room,
    pub at: NaiveDateTime,
    pub term: &'a AcademicTerm,
    pub policy: &'a AttendancePolicy,
    pub subject_id: Option<i64>,
}

/// A schedule pinned to a date, with its session if one was started.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub schedule: Schedule,
    pub window: ScheduleWindow,
    pub session: Option<Session>,
}

impl Resolution {
    pub fn is_administrative(&self) -> bool {
        self.schedule.is_administrative()
    }
}

/// Finds (or creates) the schedule a scan belongs to.
pub struct ScheduleResolver {
    pool: SqlitePool,
    schedules: SqliteScheduleRepository,
    subjects: SqliteSubjectRepository,
    sessions: SqliteSessionRepository,
    enrollments: SqliteEnrollmentRepository,
}

impl ScheduleResolver {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            schedules: SqliteScheduleRepository::new(pool.clone()),
            subjects: SqliteSubjectRepository::new(pool.clone()),
            sessions: SqliteSessionRepository::new(pool.clone()),
            enrollments: SqliteEnrollmentRepository::new(pool.clone()),
            pool,
        }
    }

    /// Resolve a time-in family scan, creating on-demand or administrative
    /// schedules where the strategy allows.
    ///
    /// # Errors
    ///
    /// - `NotFound` if nothing is scheduled for the user in the room now
    /// - `Forbidden` if a student is not enrolled in the matched subject
    pub async fn resolve(&self, req: &ResolveRequest<'_>) -> AttendanceResult<Resolution> {
        let schedule = self
            .select(req, true)
            .await?
            .ok_or_else(|| AttendanceError::not_found(Messages::NO_CLASS_NOW))?;

        self.pin(schedule, req.at.date()).await
    }

    /// The schedule a departure belongs to. Never creates schedules.
    ///
    /// # Errors
    ///
    /// As [`resolve`](Self::resolve); callers treat `NotFound` and
    /// `Forbidden` as "no preferred schedule".
    pub async fn lookup(&self, req: &ResolveRequest<'_>) -> AttendanceResult<Option<Schedule>> {
        self.select(req, false).await
    }

    async fn select(
        &self,
        req: &ResolveRequest<'_>,
        create: bool,
    ) -> AttendanceResult<Option<Schedule>> {
        let strategy = ResolutionStrategy::for_role(req.role);
        debug!(
            "Resolving schedule for {} ({:?}) in room {}",
            req.user.identifier, strategy, req.room.room_number
        );

        match strategy {
            ResolutionStrategy::Enrolled => match req.subject_id {
                Some(subject_id) => self.subject_class(req, subject_id, create).await,
                None => self.enrolled_class(req).await.map(Some),
            },
            ResolutionStrategy::Owner => {
                if let Some(subject_id) = req.subject_id {
                    return self.subject_class(req, subject_id, create).await;
                }
                match self.owned_class(req).await? {
                    Some(schedule) => Ok(Some(schedule)),
                    None => self.class_with_active_session(req).await,
                }
            }
            ResolutionStrategy::Administrative => {
                if let Some(subject_id) = req.subject_id {
                    debug!(
                        "Ignoring subject {} on scan by {}",
                        subject_id, req.user.identifier
                    );
                }
                self.room_administrative(req, create).await
            }
            ResolutionStrategy::OwnerOrAdministrative => {
                let owned = match req.subject_id {
                    Some(subject_id) => match self.subject_class(req, subject_id, create).await {
                        Ok(found) => found.filter(|s| s.is_owned_by(req.user.id)),
                        Err(AttendanceError::NotFound(_)) => None,
                        Err(e) => return Err(e),
                    },
                    None => self.owned_class(req).await?,
                };
                match owned {
                    Some(schedule) => Ok(Some(schedule)),
                    None => self.room_administrative(req, create).await,
                }
            }
        }
    }

    /// Resolve a roster session key to its schedule occurrence.
    pub async fn resolve_session_key(&self, key: &SessionKey) -> AttendanceResult<Resolution> {
        let schedule = self
            .schedules
            .find_by_room_and_start(&key.room, key.date, key.start)
            .await?
            .ok_or_else(|| AttendanceError::not_found(Messages::SESSION_NOT_FOUND))?;

        self.pin(schedule, key.date).await
    }

    /// Resolve a schedule id on a date, e.g. for ending a session.
    pub async fn resolve_schedule(
        &self,
        schedule_id: i64,
        date: NaiveDate,
    ) -> AttendanceResult<Resolution> {
        let schedule = self
            .schedules
            .find_by_id(schedule_id)
            .await?
            .ok_or_else(|| AttendanceError::not_found(Messages::SESSION_NOT_FOUND))?;

        self.pin(schedule, date).await
    }

    /// The next class later today in the room that `student` is enrolled in.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no class starts after `at` in the room today
    /// - `Forbidden` if classes follow but the student takes none of them
    pub async fn upcoming_for_student(
        &self,
        student: &User,
        room: &Room,
        at: NaiveDateTime,
        term: &AcademicTerm,
    ) -> AttendanceResult<Resolution> {
        let date = at.date();
        let now = truncate_to_minute(at);

        let upcoming: Vec<Schedule> = self
            .schedules
            .find_in_room_on_day(room.id, date.weekday(), term)
            .await?
            .into_iter()
            .filter(|s| !s.is_administrative() && date.and_time(s.start_time) > now)
            .collect();

        let Some(first) = upcoming.first() else {
            return Err(AttendanceError::not_found(Messages::NO_UPCOMING_CLASS));
        };

        for schedule in &upcoming {
            if self
                .enrollments
                .is_enrolled(student.id, schedule.subject_id, term)
                .await?
            {
                return self.pin(schedule.clone(), date).await;
            }
        }

        Err(AttendanceError::forbidden(Messages::not_enrolled(&first.subject_code)))
    }

    /// The room's administrative schedule for `date`, created on first use.
    ///
    /// Weekends use the Monday row. Safe to call concurrently: slot creation
    /// ignores rows another caller already inserted.
    pub async fn administrative(
        &self,
        room_id: i64,
        date: NaiveDate,
        term: &AcademicTerm,
    ) -> AttendanceResult<Schedule> {
        let day = administrative_day(date.weekday());

        if let Some(schedule) = self.schedules.find_administrative(room_id, day, term).await? {
            return Ok(schedule);
        }

        let subject = self
            .subjects
            .get_or_create(ADMIN_SUBJECT_CODE, ADMIN_SUBJECT_NAME)
            .await?;

        let mut tx = self.pool.begin().await?;
        match transaction::create_admin_schedules(&mut tx, subject.id, room_id, term).await {
            Ok(created) => {
                tx.commit().await?;
                if created > 0 {
                    info!(
                        "Created {} administrative schedules for room {} ({})",
                        created, room_id, term
                    );
                }
            }
            Err(e) if e.is_unique_violation() => {
                debug!("Administrative schedules for room {} created concurrently", room_id);
            }
            Err(e) => return Err(e.into()),
        }

        self.schedules
            .find_administrative(room_id, day, term)
            .await?
            .ok_or_else(|| AttendanceError::not_found(Messages::NO_CLASS_NOW))
    }

    async fn room_administrative(
        &self,
        req: &ResolveRequest<'_>,
        create: bool,
    ) -> AttendanceResult<Option<Schedule>> {
        let date = req.at.date();
        if create {
            return self.administrative(req.room.id, date, req.term).await.map(Some);
        }

        let day = administrative_day(date.weekday());
        Ok(self
            .schedules
            .find_administrative(req.room.id, day, req.term)
            .await?)
    }

    /// The subject's slot in the room today.
    ///
    /// An existing slot must accept a scan at `req.at`. A missing one is
    /// created on demand when `create` is set, else `None`.
    async fn subject_class(
        &self,
        req: &ResolveRequest<'_>,
        subject_id: i64,
        create: bool,
    ) -> AttendanceResult<Option<Schedule>> {
        let subject = self
            .subjects
            .find_by_id(subject_id)
            .await?
            .ok_or_else(|| AttendanceError::not_found(Messages::SUBJECT_NOT_FOUND))?;

        let date = req.at.date();
        let day = date.weekday();

        if req.role == Role::Student
            && !self
                .enrollments
                .is_enrolled(req.user.id, subject.id, req.term)
                .await?
        {
            return Err(AttendanceError::forbidden(Messages::not_enrolled(&subject.code)));
        }

        if let Some(schedule) = self
            .schedules
            .find_for_subject(subject.id, req.room.id, day, req.term)
            .await?
        {
            if !schedule.window_on(date)?.accepts_scan_at(req.at, req.policy) {
                debug!(
                    "{} in room {} does not accept a scan at {}",
                    subject.code,
                    req.room.room_number,
                    req.at.format("%H:%M")
                );
                return Err(AttendanceError::not_found(Messages::NO_CLASS_NOW));
            }
            return Ok(Some(schedule));
        }

        if !create {
            return Ok(None);
        }

        let (start_time, end_time) = default_slot(req.at);
        let owner = (req.role != Role::Student && req.role != Role::Custodian).then_some(req.user.id);
        let created = self
            .schedules
            .insert_or_ignore(&NewSchedule {
                subject_id: subject.id,
                room_id: req.room.id,
                instructor_id: owner,
                day,
                start_time,
                end_time,
                term: req.term.clone(),
            })
            .await?;

        if created.is_some() {
            info!(
                "Created {} schedule for {} in room {} at {}",
                subject.code,
                day,
                req.room.room_number,
                start_time.format("%H:%M")
            );
        }

        Ok(self
            .schedules
            .find_for_subject(subject.id, req.room.id, day, req.term)
            .await?)
    }

    async fn enrolled_class(&self, req: &ResolveRequest<'_>) -> AttendanceResult<Schedule> {
        let date = req.at.date();

        for schedule in self.schedules.find_with_active_session(req.room.id, date).await? {
            if schedule.window_on(date)?.has_ended(req.at) {
                continue;
            }
            if self
                .enrollments
                .is_enrolled(req.user.id, schedule.subject_id, req.term)
                .await?
            {
                return Ok(schedule);
            }
        }

        let candidates = self.open_now(
            self.schedules
                .find_in_room_on_day(req.room.id, date.weekday(), req.term)
                .await?,
            req,
        )?;

        let Some(first) = candidates.first() else {
            return Err(AttendanceError::not_found(Messages::NO_CLASS_NOW));
        };
        let not_enrolled = Messages::not_enrolled(&first.subject_code);

        for schedule in candidates {
            if self
                .enrollments
                .is_enrolled(req.user.id, schedule.subject_id, req.term)
                .await?
            {
                return Ok(schedule);
            }
        }

        Err(AttendanceError::forbidden(not_enrolled))
    }

    async fn owned_class(&self, req: &ResolveRequest<'_>) -> AttendanceResult<Option<Schedule>> {
        let owned = self
            .schedules
            .find_owned_in_room_on_day(req.user.id, req.room.id, req.at.date().weekday(), req.term)
            .await?;

        Ok(self.open_now(owned, req)?.into_iter().next())
    }

    async fn class_with_active_session(
        &self,
        req: &ResolveRequest<'_>,
    ) -> AttendanceResult<Option<Schedule>> {
        let date = req.at.date();
        for schedule in self.schedules.find_with_active_session(req.room.id, date).await? {
            if !schedule.window_on(date)?.has_ended(req.at) {
                return Ok(Some(schedule));
            }
        }
        Ok(None)
    }

    /// Non-administrative schedules accepting a scan at `req.at`, nearest start first.
    fn open_now(
        &self,
        schedules: Vec<Schedule>,
        req: &ResolveRequest<'_>,
    ) -> AttendanceResult<Vec<Schedule>> {
        let date = req.at.date();
        let mut open = Vec::new();

        for schedule in schedules {
            if schedule.is_administrative() {
                continue;
            }
            let window = schedule.window_on(date)?;
            if window.accepts_scan_at(req.at, req.policy) {
                let distance = (window.starts_at() - truncate_to_minute(req.at))
                    .num_minutes()
                    .abs();
                open.push((distance, schedule));
            }
        }

        open.sort_by_key(|(distance, s)| (*distance, s.start_time));
        Ok(open.into_iter().map(|(_, s)| s).collect())
    }

    async fn pin(&self, schedule: Schedule, date: NaiveDate) -> AttendanceResult<Resolution> {
        let window = schedule.window_on(date)?;
        let session = self.sessions.find_for_date(schedule.id, date).await?;

        Ok(Resolution {
            schedule,
            window,
            session,
        })
    }
}

/// Weekday whose administrative row serves `day`.
fn administrative_day(day: Weekday) -> Weekday {
    match day {
        Weekday::Sat | Weekday::Sun => Weekday::Mon,
        other => other,
    }
}

/// Start and end of an on-demand slot beginning at the scan minute.
fn default_slot(at: NaiveDateTime) -> (NaiveTime, NaiveTime) {
    let last_minute = NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN);
    let latest_start = last_minute - Duration::minutes(1);

    let start = truncate_to_minute(at).time().min(latest_start);
    let (end, wrapped) =
        start.overflowing_add_signed(Duration::minutes(DEFAULT_CLASS_DURATION_MINUTES));
    let end = if wrapped != 0 { last_minute } else { end.min(last_minute) };

    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Role::Student, ResolutionStrategy::Enrolled)]
    #[case(Role::Instructor, ResolutionStrategy::Owner)]
    #[case(Role::Admin, ResolutionStrategy::Owner)]
    #[case(Role::Custodian, ResolutionStrategy::Administrative)]
    #[case(Role::Dean, ResolutionStrategy::OwnerOrAdministrative)]
    fn test_strategy_for_role(#[case] role: Role, #[case] expected: ResolutionStrategy) {
        assert_eq!(ResolutionStrategy::for_role(role), expected);
    }

    #[rstest]
    #[case(Weekday::Mon, Weekday::Mon)]
    #[case(Weekday::Fri, Weekday::Fri)]
    #[case(Weekday::Sat, Weekday::Mon)]
    #[case(Weekday::Sun, Weekday::Mon)]
    fn test_administrative_day(#[case] day: Weekday, #[case] expected: Weekday) {
        assert_eq!(administrative_day(day), expected);
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[rstest]
    #[case(at(10, 15, 42), hm(10, 15), hm(11, 45))]
    #[case(at(23, 0, 0), hm(23, 0), hm(23, 59))]
    #[case(at(23, 59, 30), hm(23, 58), hm(23, 59))]
    fn test_default_slot(
        #[case] scan: NaiveDateTime,
        #[case] start: NaiveTime,
        #[case] end: NaiveTime,
    ) {
        assert_eq!(default_slot(scan), (start, end));
    }
}

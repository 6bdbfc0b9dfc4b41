use crate::error::{AttendanceError, AttendanceResult};
use crate::messages::Messages;
use crate::recorder::{AttendanceStore, DepartureScan, PrimaryScan, RecordOutcome};
use crate::resolver::{ResolveRequest, ScheduleResolver};
use crate::roster::{Roster, RosterAggregator};
use chrono::{NaiveDateTime, NaiveTime};
use rollcall_core::{
    AttendanceStatus, AuthMethod, Clock, EntryPoint, Role, ScanLocation, ScanType, SessionKey,
};
use rollcall_network::{DoorLock, HttpDoorLock, LockDispatcher, UnlockCommand};
use rollcall_storage::repositories::{
    RoomRepository, ScheduleRepository, SessionRepository, SettingsRepository,
    SqliteRoomRepository, SqliteScheduleRepository, SqliteSessionRepository,
    SqliteSettingsRepository, SqliteUserRepository, UserRepository,
};
use rollcall_storage::{Room, User};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info};

/// How the reader identified the person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Credential {
    /// RFID tag or typed institutional number
    Rfid(String),
    /// Enrolled fingerprint slot
    Fingerprint(i64),
}

impl Credential {
    pub fn auth_method(&self) -> AuthMethod {
        match self {
            Self::Rfid(_) => AuthMethod::Rfid,
            Self::Fingerprint(_) => AuthMethod::Fingerprint,
        }
    }
}

/// A door scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub credential: Credential,
    pub room_id: i64,
    /// Subject the scan is explicitly for, when the reader asks
    pub subject_id: Option<i64>,
    pub location: ScanLocation,
}

/// Student "I am here before class" scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarlyArrivalRequest {
    pub credential: Credential,
    pub room_id: i64,
}

/// What happened to the door on a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorAction {
    /// The role does not open doors, or no lock client is configured
    None,
    /// The room has no lock controller
    NoLock,
    /// An unlock was dispatched; its outcome is only logged
    Dispatched,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReceipt {
    pub attendance_id: i64,
    pub status: AttendanceStatus,
    pub scan_type: ScanType,
    pub scan_time: NaiveDateTime,
    pub room: String,
    pub subject_code: Option<String>,
    pub subject_name: Option<String>,
    pub session_started: bool,
    pub session_ended: bool,
    pub door: DoorAction,
}

#[derive(Debug, Clone, Serialize)]
pub struct EarlyArrivalReceipt {
    pub attendance_id: i64,
    pub status: AttendanceStatus,
    pub scan_time: NaiveDateTime,
    pub subject_code: String,
    pub subject_name: String,
    pub class_start: NaiveTime,
    pub class_end: NaiveTime,
}

/// Entry points of the attendance engine.
///
/// Wires the resolver, the classifier-backed store and the roster together
/// with the user directory, the settings table and the door-lock dispatcher.
/// The current term and policy are re-read from settings on every call.
///
/// # Submit flow
///
/// 1. **Identify**: credential → user; unknown → `NotFound`, inactive → `Forbidden`
/// 2. **Room**: room id → room; unknown → `NotFound`
/// 3. **Departure**: an `inside` reader records a `time_out` against an existing
///    schedule (never creating one) and stops here
/// 4. **Resolve**: role-specific schedule lookup (may create schedules)
/// 5. **Record**: classify and write, retrying a lost race once
/// 6. **Door**: instructors and admins get an unlock dispatched, even on `Conflict`
///
/// # Examples
///
/// ```no_run
/// use rollcall_engine::{AttendanceService, Credential, ScanRequest};
/// use rollcall_core::{ScanLocation, SystemClock};
/// use rollcall_storage::{Database, DatabaseConfig};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let db = Database::new(DatabaseConfig::new("rollcall.db")).await?;
/// let service = AttendanceService::without_doors(db.pool().clone(), Arc::new(SystemClock));
///
/// let receipt = service
///     .submit_scan(ScanRequest {
///         credential: Credential::Rfid("STU001".to_string()),
///         room_id: 1,
///         subject_id: None,
///         location: ScanLocation::Outside,
///     })
///     .await?;
/// println!("{} ({})", receipt.status, receipt.room);
/// # Ok(())
/// # }
/// ```
pub struct AttendanceService<L: DoorLock = HttpDoorLock> {
    users: SqliteUserRepository,
    rooms: SqliteRoomRepository,
    schedules: SqliteScheduleRepository,
    sessions: SqliteSessionRepository,
    settings: SqliteSettingsRepository,
    resolver: ScheduleResolver,
    store: AttendanceStore,
    roster: RosterAggregator,
    doors: Option<LockDispatcher<L>>,
    clock: Arc<dyn Clock>,
}

impl AttendanceService<HttpDoorLock> {
    /// Service that never dispatches unlocks
    pub fn without_doors(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self::new(pool, clock, None)
    }
}

impl<L: DoorLock> AttendanceService<L> {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>, doors: Option<LockDispatcher<L>>) -> Self {
        Self {
            users: SqliteUserRepository::new(pool.clone()),
            rooms: SqliteRoomRepository::new(pool.clone()),
            schedules: SqliteScheduleRepository::new(pool.clone()),
            sessions: SqliteSessionRepository::new(pool.clone()),
            settings: SqliteSettingsRepository::new(pool.clone()),
            resolver: ScheduleResolver::new(pool.clone()),
            store: AttendanceStore::new(pool.clone()),
            roster: RosterAggregator::new(pool),
            doors,
            clock,
        }
    }

    /// Record a door scan.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Forbidden` or `Conflict` as described on the type;
    /// `Storage` for infrastructure failures. Door failures never surface.
    pub async fn submit_scan(&self, request: ScanRequest) -> AttendanceResult<ScanReceipt> {
        let now = self.clock.now();
        let (user, role) = self.identify(&request.credential).await?;
        let room = self.room(request.room_id).await?;
        let term = self.settings.current_term().await?;
        let policy = self.settings.attendance_policy().await?;

        let resolve = ResolveRequest {
            user: &user,
            role,
            room: &room,
            at: now,
            term: &term,
            policy: &policy,
            subject_id: request.subject_id,
        };

        if request.location.is_departure() {
            let preferred_schedule = match self.resolver.lookup(&resolve).await {
                Ok(schedule) => schedule.map(|s| s.id),
                Err(AttendanceError::NotFound(_) | AttendanceError::Forbidden(_)) => None,
                Err(e) => return Err(e),
            };

            let outcome = self
                .store
                .record_departure(&DepartureScan {
                    user: &user,
                    role,
                    preferred_schedule,
                    scan_time: now,
                    auth_method: request.credential.auth_method(),
                })
                .await?;

            let door = self.open_door(role, &room, &user);
            return self.receipt(outcome, &room, door).await;
        }

        let resolution = self.resolver.resolve(&resolve).await?;
        let recorded = self
            .store
            .record_primary(&PrimaryScan {
                user: &user,
                role,
                resolution: &resolution,
                scan_time: now,
                auth_method: request.credential.auth_method(),
                entry: EntryPoint::Submit,
                policy: &policy,
            })
            .await;

        let door = self.open_door(role, &room, &user);
        let outcome = recorded?;

        Ok(ScanReceipt {
            attendance_id: outcome.record_id,
            status: outcome.status,
            scan_type: outcome.scan_type,
            scan_time: outcome.scan_time,
            room: room.room_number,
            subject_code: Some(resolution.schedule.subject_code),
            subject_name: Some(resolution.schedule.subject_name),
            session_started: outcome.session_started,
            session_ended: outcome.session_ended,
            door,
        })
    }

    /// Record a student's arrival before their next class in the room.
    ///
    /// # Errors
    ///
    /// - `Forbidden` for non-students or students not enrolled in the next class
    /// - `NotFound` when no class follows today
    /// - `TooEarly` when the next class's early window has not opened
    /// - `Conflict` when the student already checked in
    pub async fn early_arrival_scan(
        &self,
        request: EarlyArrivalRequest,
    ) -> AttendanceResult<EarlyArrivalReceipt> {
        let now = self.clock.now();
        let (user, role) = self.identify(&request.credential).await?;
        if role != Role::Student {
            return Err(AttendanceError::forbidden(Messages::STUDENTS_ONLY));
        }

        let room = self.room(request.room_id).await?;
        let term = self.settings.current_term().await?;
        let policy = self.settings.attendance_policy().await?;

        let resolution = self
            .resolver
            .upcoming_for_student(&user, &room, now, &term)
            .await?;

        let outcome = self
            .store
            .record_primary(&PrimaryScan {
                user: &user,
                role,
                resolution: &resolution,
                scan_time: now,
                auth_method: request.credential.auth_method(),
                entry: EntryPoint::EarlyArrival,
                policy: &policy,
            })
            .await?;

        Ok(EarlyArrivalReceipt {
            attendance_id: outcome.record_id,
            status: outcome.status,
            scan_time: outcome.scan_time,
            subject_code: resolution.schedule.subject_code,
            subject_name: resolution.schedule.subject_name,
            class_start: resolution.schedule.start_time,
            class_end: resolution.schedule.end_time,
        })
    }

    /// Roster for the class session named by `session_key`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the key is malformed or names no schedule.
    pub async fn roster(&self, session_key: &str) -> AttendanceResult<Roster> {
        let key: SessionKey = session_key.parse().map_err(|_| {
            debug!("Rejected session key {:?}", session_key);
            AttendanceError::not_found(Messages::SESSION_NOT_FOUND)
        })?;

        let resolution = self.resolver.resolve_session_key(&key).await?;
        self.roster.build(&resolution).await
    }

    /// End today's active session of a schedule.
    ///
    /// # Errors
    ///
    /// `NotFound` if the schedule is unknown or has no active session today.
    pub async fn end_session(&self, schedule_id: i64) -> AttendanceResult<i64> {
        let now = self.clock.now();
        let resolution = self.resolver.resolve_schedule(schedule_id, now.date()).await?;

        let session = resolution
            .session
            .filter(|s| s.is_active())
            .ok_or_else(|| AttendanceError::not_found(Messages::NO_ACTIVE_SESSION))?;

        if !self.sessions.end(session.id, now).await? {
            return Err(AttendanceError::not_found(Messages::NO_ACTIVE_SESSION));
        }

        info!("Session {} for schedule {} ended", session.id, schedule_id);
        Ok(session.id)
    }

    /// Open a room's door and wait for the controller.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown rooms or rooms without a lock, `Upstream` if the
    /// controller fails.
    pub async fn unlock_room(&self, room_id: i64, requested_by: &str) -> AttendanceResult<()> {
        let room = self.room(room_id).await?;
        let address = room
            .lock_address
            .clone()
            .ok_or_else(|| AttendanceError::not_found(Messages::NO_LOCK))?;
        let doors = self
            .doors
            .as_ref()
            .ok_or_else(|| AttendanceError::not_found(Messages::NO_LOCK))?;

        doors
            .unlock_now(UnlockCommand::new(room.room_number, address, requested_by))
            .await?;
        Ok(())
    }

    /// Wait for dispatched unlocks to finish.
    pub async fn drain_doors(&self) {
        if let Some(doors) = &self.doors {
            doors.drain().await;
        }
    }

    async fn identify(&self, credential: &Credential) -> AttendanceResult<(User, Role)> {
        let user = match credential {
            Credential::Rfid(identifier) => self.users.find_by_identifier(identifier).await?,
            Credential::Fingerprint(slot) => self.users.find_by_fingerprint(*slot).await?,
        }
        .ok_or_else(|| AttendanceError::not_found(Messages::USER_NOT_FOUND))?;

        if !user.active {
            debug!("Scan from inactive user {}", user.identifier);
            return Err(AttendanceError::forbidden(Messages::USER_INACTIVE));
        }

        let role = user.role()?;
        Ok((user, role))
    }

    async fn room(&self, room_id: i64) -> AttendanceResult<Room> {
        self.rooms
            .find_by_id(room_id)
            .await?
            .ok_or_else(|| AttendanceError::not_found(Messages::ROOM_NOT_FOUND))
    }

    fn open_door(&self, role: Role, room: &Room, user: &User) -> DoorAction {
        if !role.opens_door() {
            return DoorAction::None;
        }
        let Some(doors) = &self.doors else {
            return DoorAction::None;
        };
        let Some(address) = &room.lock_address else {
            debug!("Room {} has no lock; skipping unlock", room.room_number);
            return DoorAction::NoLock;
        };

        drop(doors.dispatch(UnlockCommand::new(
            room.room_number.clone(),
            address.clone(),
            user.identifier.clone(),
        )));
        DoorAction::Dispatched
    }

    async fn receipt(
        &self,
        outcome: RecordOutcome,
        room: &Room,
        door: DoorAction,
    ) -> AttendanceResult<ScanReceipt> {
        let schedule = match outcome.schedule_id {
            Some(id) => self.schedules.find_by_id(id).await?,
            None => None,
        };

        Ok(ScanReceipt {
            attendance_id: outcome.record_id,
            status: outcome.status,
            scan_type: outcome.scan_type,
            scan_time: outcome.scan_time,
            room: room.room_number.clone(),
            subject_code: schedule.as_ref().map(|s| s.subject_code.clone()),
            subject_name: schedule.map(|s| s.subject_name),
            session_started: outcome.session_started,
            session_ended: outcome.session_ended,
            door,
        })
    }
}

//! No-show reconciliation.
//!
//! When a class ends and its instructor never started a session, every
//! `Awaiting Confirmation` record for that class day is promoted to
//! `Present`. Waiting records of an ended class that did have a session were
//! missed by the session start; they are settled as of the session start
//! instead. A run only touches rows still waiting, so repeating it is
//! harmless.
//!
//! Each run also looks back over a few previous dates, so a worker that was
//! down across midnight still reconciles yesterday's classes. [`SweepWorker`]
//! repeats the run on an interval, guarded by a lease so that one process in a
//! deployment does the work.

use crate::error::AttendanceResult;
use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use rollcall_core::classifier::confirmation_status;
use rollcall_core::policy::truncate_to_minute;
use rollcall_core::{AcademicTerm, AttendancePolicy, AttendanceStatus, Clock};
use rollcall_storage::repositories::{
    AttendanceRepository, LeaseRepository, ScheduleRepository, SessionRepository,
    SettingsRepository, SqliteAttendanceRepository, SqliteLeaseRepository,
    SqliteScheduleRepository, SqliteSessionRepository, SqliteSettingsRepository,
};
use rollcall_storage::Schedule;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Lease name shared by every sweep worker
pub const SWEEP_LEASE: &str = "no-show-sweep";

/// Previous dates swept on every run unless configured otherwise
pub const DEFAULT_LOOKBACK_DAYS: u32 = 2;

/// A weekly slot falls on one date per week, so a look-back past six days
/// would visit the same slot twice.
const MAX_LOOKBACK_DAYS: u32 = 6;

/// Result of one sweep run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Schedules whose waiting records were promoted
    pub reconciled: Vec<i64>,
    pub updated: u64,
}

/// One pass of the reconciliation.
pub struct NoShowSweep {
    schedules: SqliteScheduleRepository,
    sessions: SqliteSessionRepository,
    attendance: SqliteAttendanceRepository,
    settings: SqliteSettingsRepository,
    lookback_days: u32,
}

impl NoShowSweep {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            schedules: SqliteScheduleRepository::new(pool.clone()),
            sessions: SqliteSessionRepository::new(pool.clone()),
            attendance: SqliteAttendanceRepository::new(pool.clone()),
            settings: SqliteSettingsRepository::new(pool),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }

    /// Also sweep this many dates before today, at most six.
    pub fn lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = days.min(MAX_LOOKBACK_DAYS);
        self
    }

    /// Settle waiting records of classes that ended before `now`, today or on
    /// one of the look-back dates.
    pub async fn run(&self, now: NaiveDateTime, term: &AcademicTerm) -> AttendanceResult<SweepReport> {
        let now = truncate_to_minute(now);
        let policy = self.settings.attendance_policy().await?;

        let mut report = SweepReport::default();
        for back in (0..=self.lookback_days).rev() {
            let Some(date) = now.date().checked_sub_days(Days::new(u64::from(back))) else {
                continue;
            };
            // Past dates are over; any end time qualifies.
            let before = if back == 0 {
                now.time()
            } else {
                NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
            };
            self.sweep_date(date, before, term, &policy, &mut report).await?;
        }

        if report.updated > 0 {
            info!(
                "No-show sweep reconciled schedules {:?}: {} records settled",
                report.reconciled, report.updated
            );
        } else {
            debug!("No-show sweep found nothing to reconcile");
        }

        Ok(report)
    }

    async fn sweep_date(
        &self,
        date: NaiveDate,
        before: NaiveTime,
        term: &AcademicTerm,
        policy: &AttendancePolicy,
        report: &mut SweepReport,
    ) -> AttendanceResult<()> {
        for schedule in self
            .schedules
            .find_ended_without_session(date, before, term)
            .await?
        {
            let updated = self
                .attendance
                .confirm_awaiting(schedule.id, date, AttendanceStatus::Present, None)
                .await?;
            record(report, &schedule, date, updated, AttendanceStatus::Present);
        }

        for schedule in self
            .schedules
            .find_ended_with_session(date, before, term)
            .await?
        {
            let Some(session) = self.sessions.find_for_date(schedule.id, date).await? else {
                continue;
            };
            let status = confirmation_status(&schedule.window_on(date)?, policy, session.started_at);
            let updated = self
                .attendance
                .confirm_awaiting(schedule.id, date, status, Some(session.id))
                .await?;
            if updated > 0 {
                warn!(
                    "Session {} for {} on {} left {} records waiting",
                    session.id, schedule.subject_code, date, updated
                );
            }
            record(report, &schedule, date, updated, status);
        }

        Ok(())
    }
}

fn record(
    report: &mut SweepReport,
    schedule: &Schedule,
    date: NaiveDate,
    updated: u64,
    status: AttendanceStatus,
) {
    if updated == 0 {
        return;
    }
    debug!(
        "Settled {} waiting records for {} ({}) on {} as {}",
        updated, schedule.subject_code, schedule.id, date, status
    );
    report.reconciled.push(schedule.id);
    report.updated += updated;
}

/// Configuration for the periodic sweep
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Time between runs
    pub interval: Duration,

    /// How long a won lease stays valid without renewal
    pub lease_ttl: Duration,

    /// Lease holder name; unique per process
    pub worker_name: String,

    /// Previous dates swept on every run
    pub lookback_days: u32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            lease_ttl: Duration::from_secs(600),
            worker_name: format!("rollcall-{}", std::process::id()),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }
}

/// Runs [`NoShowSweep`] on an interval while holding the sweep lease.
pub struct SweepWorker {
    sweep: NoShowSweep,
    leases: SqliteLeaseRepository,
    settings: SqliteSettingsRepository,
    clock: Arc<dyn Clock>,
    config: SweepConfig,
}

impl SweepWorker {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>, config: SweepConfig) -> Self {
        Self {
            sweep: NoShowSweep::new(pool.clone()).lookback_days(config.lookback_days),
            leases: SqliteLeaseRepository::new(pool.clone()),
            settings: SqliteSettingsRepository::new(pool),
            clock,
            config,
        }
    }

    /// Run once if this worker holds (or can take) the lease.
    ///
    /// Returns `None` when another worker holds the lease.
    pub async fn run_once(&self) -> AttendanceResult<Option<SweepReport>> {
        let now = self.clock.now();
        let ttl = chrono::Duration::from_std(self.config.lease_ttl)
            .unwrap_or_else(|_| chrono::Duration::minutes(10));

        if !self
            .leases
            .try_acquire(SWEEP_LEASE, &self.config.worker_name, now, ttl)
            .await?
        {
            debug!("{} skipped sweep: lease held elsewhere", self.config.worker_name);
            return Ok(None);
        }

        let term = self.settings.current_term().await?;
        Ok(Some(self.sweep.run(now, &term).await?))
    }

    /// Sweep every interval until `cancel` fires. Failed runs are logged and
    /// retried on the next tick.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            "Starting sweep worker {} (interval {}s)",
            self.config.worker_name,
            self.config.interval.as_secs()
        );

        let mut timer = interval(self.config.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = timer.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!("No-show sweep failed: {}", e);
                    }
                }
            }
        }

        match self.leases.release(SWEEP_LEASE, &self.config.worker_name).await {
            Ok(true) => debug!("{} released sweep lease", self.config.worker_name),
            Ok(false) => {}
            Err(e) => error!("Failed to release sweep lease: {}", e),
        }
        info!("Sweep worker {} stopped", self.config.worker_name);
    }
}

//! Attendance resolution and reconciliation engine.
//!
//! Turns door scans into attendance records tied to scheduled classes:
//!
//! - [`ScheduleResolver`] finds the class a scan belongs to
//! - the classifier in `rollcall_core` decides the status
//! - [`AttendanceStore`] writes it idempotently
//! - [`RosterAggregator`] projects a class day into one row per student
//! - [`NoShowSweep`] / [`SweepWorker`] settle provisional records of classes
//!   whose instructor never started a session
//!
//! [`AttendanceService`] is the entry point used by the `rollcall` binary.

pub mod error;
pub mod messages;
pub mod recorder;
pub mod resolver;
pub mod roster;
pub mod service;
pub mod sweep;

pub use error::{AttendanceError, AttendanceResult};
pub use recorder::{AttendanceStore, RecordOutcome};
pub use resolver::{Resolution, ResolutionStrategy, ScheduleResolver};
pub use roster::{InstructorAttendance, Roster, RosterAggregator, RosterRow, RosterStats};
pub use service::{
    AttendanceService, Credential, DoorAction, EarlyArrivalReceipt, EarlyArrivalRequest,
    ScanReceipt, ScanRequest,
};
pub use sweep::{NoShowSweep, SweepConfig, SweepReport, SweepWorker};

//! Attendance policy and schedule windows.
//!
//! All arithmetic happens on the scheduled date's local wall-clock time at
//! minute granularity. Seconds on a scan timestamp never move a scan across
//! a boundary.

use crate::constants::{DEFAULT_EARLY_ARRIVAL_MINUTES, DEFAULT_LATE_THRESHOLD_MINUTES};
use crate::{Result, error::Error};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Configurable time windows used by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendancePolicy {
    /// How long before class start an early arrival is accepted.
    pub early_arrival_window: Duration,

    /// Offset from class start at which scans become late (inclusive).
    pub late_threshold: Duration,
}

impl Default for AttendancePolicy {
    fn default() -> Self {
        Self {
            early_arrival_window: Duration::minutes(DEFAULT_EARLY_ARRIVAL_MINUTES),
            late_threshold: Duration::minutes(DEFAULT_LATE_THRESHOLD_MINUTES),
        }
    }
}

impl AttendancePolicy {
    /// Build a policy from minute counts, clamping negatives to zero.
    pub fn from_minutes(early_arrival: i64, late_threshold: i64) -> Self {
        Self {
            early_arrival_window: Duration::minutes(early_arrival.max(0)),
            late_threshold: Duration::minutes(late_threshold.max(0)),
        }
    }
}

/// One concrete occurrence of a weekly schedule slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleWindow {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ScheduleWindow {
    /// Create a window, rejecting empty or inverted ranges.
    ///
    /// # Errors
    /// Returns `Error::InvalidWindow` if `start >= end`.
    pub fn new(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Result<Self> {
        if start >= end {
            return Err(Error::InvalidWindow {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { date, start, end })
    }

    #[must_use]
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(truncate_time(self.start))
    }

    #[must_use]
    pub fn ends_at(&self) -> NaiveDateTime {
        self.date.and_time(truncate_time(self.end))
    }

    /// First minute at which an early arrival is accepted.
    #[must_use]
    pub fn early_opens_at(&self, policy: &AttendancePolicy) -> NaiveDateTime {
        self.starts_at() - policy.early_arrival_window
    }

    /// First minute that counts as late.
    #[must_use]
    pub fn late_from(&self, policy: &AttendancePolicy) -> NaiveDateTime {
        self.starts_at() + policy.late_threshold
    }

    /// Returns `true` once the class end has strictly passed.
    #[must_use]
    pub fn has_ended(&self, now: NaiveDateTime) -> bool {
        truncate_to_minute(now) > self.ends_at()
    }

    /// Returns `true` if `at` falls between the early-arrival opening and the class end.
    #[must_use]
    pub fn accepts_scan_at(&self, at: NaiveDateTime, policy: &AttendancePolicy) -> bool {
        let at = truncate_to_minute(at);
        at >= self.early_opens_at(policy) && at <= self.ends_at()
    }
}

/// Drop seconds and sub-second precision.
#[must_use]
pub fn truncate_to_minute(at: NaiveDateTime) -> NaiveDateTime {
    at.date().and_time(truncate_time(at.time()))
}

fn truncate_time(t: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(t.hour(), t.minute(), 0).unwrap_or(t)
}

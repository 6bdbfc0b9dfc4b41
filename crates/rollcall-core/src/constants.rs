//! Attendance constants shared by every Rollcall crate.
//!
//! Window sizes here are only defaults. The effective values come from the
//! settings table at runtime (see `AttendancePolicy`).

// ============================================================================
// Time windows
// ============================================================================

/// Minutes before a class start during which a student scan is accepted as
/// an early arrival.
pub const DEFAULT_EARLY_ARRIVAL_MINUTES: i64 = 15;

/// Minutes after a class start from which a scan is classified as late.
///
/// The boundary itself is late: a scan at exactly `start + 15` is `Late`.
pub const DEFAULT_LATE_THRESHOLD_MINUTES: i64 = 15;

/// Length of a schedule created on demand for an explicit subject.
pub const DEFAULT_CLASS_DURATION_MINUTES: i64 = 90;

// ============================================================================
// Administrative access
// ============================================================================

/// Subject code of the synthetic schedules used for door-access logging.
pub const ADMIN_SUBJECT_CODE: &str = "ADMIN-ACCESS";

/// Display name of the administrative subject.
pub const ADMIN_SUBJECT_NAME: &str = "Administrative Access";

/// Administrative schedules cover the whole day.
pub const ADMIN_DAY_START: (u32, u32) = (0, 0);

/// Last minute covered by an administrative schedule.
pub const ADMIN_DAY_END: (u32, u32) = (23, 59);

// ============================================================================
// Session keys
// ============================================================================

/// Separator used by the structured session key format.
pub const SESSION_KEY_SEPARATOR: char = '_';

/// Separator used by the legacy hyphenated session key format.
pub const LEGACY_SESSION_KEY_SEPARATOR: char = '-';

/// Length of the `YYYY-MM-DD` prefix shared by both key formats.
pub const SESSION_KEY_DATE_LEN: usize = 10;

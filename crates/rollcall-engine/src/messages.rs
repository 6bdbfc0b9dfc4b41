//! User-facing messages for scan outcomes.
//!
//! Readers show these on a small display next to the door, so they stay
//! short and plain ASCII. Errors carry them verbatim; callers render
//! `AttendanceError`'s `Display` output directly.
//!
//! # Usage
//!
//! ```
//! use rollcall_engine::messages::Messages;
//!
//! assert_eq!(Messages::not_enrolled("SUBJ101"), "not enrolled in SUBJ101");
//! ```

/// Display messages for attendance outcomes
pub struct Messages;

impl Messages {
    /// Credential does not match any user
    pub const USER_NOT_FOUND: &'static str = "user not found";

    /// User exists but is deactivated
    pub const USER_INACTIVE: &'static str = "user account is inactive";

    /// Room id does not exist
    pub const ROOM_NOT_FOUND: &'static str = "room not found";

    /// Explicit subject id does not exist
    pub const SUBJECT_NOT_FOUND: &'static str = "subject not found";

    /// Nothing scheduled in the room at scan time
    pub const NO_CLASS_NOW: &'static str = "no class in this room right now";

    /// Early-arrival scan with no later class today
    pub const NO_UPCOMING_CLASS: &'static str = "no upcoming class";

    /// Early-arrival entry point used by a non-student
    pub const STUDENTS_ONLY: &'static str = "early arrival is for students only";

    /// Session key does not parse or matches no schedule
    pub const SESSION_NOT_FOUND: &'static str = "class session not found";

    /// No session to end
    pub const NO_ACTIVE_SESSION: &'static str = "no active session";

    /// Room has no lock controller configured
    pub const NO_LOCK: &'static str = "room has no door lock";

    pub const NOT_ENROLLED_PREFIX: &'static str = "not enrolled in";
    pub const TOO_EARLY_PREFIX: &'static str = "too early, early arrival opens at";
    pub const ALREADY_RECORDED_PREFIX: &'static str = "attendance already recorded as";

    pub fn not_enrolled(subject_code: &str) -> String {
        format!("{} {}", Self::NOT_ENROLLED_PREFIX, subject_code)
    }
}

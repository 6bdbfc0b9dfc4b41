use crate::{Result, error::Error};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a user as resolved by the user directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Instructor,
    Admin,
    Custodian,
    Dean,
}

impl Role {
    /// Database/text representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
            Role::Admin => "admin",
            Role::Custodian => "custodian",
            Role::Dean => "dean",
        }
    }

    /// Returns `true` if a scan by this role asks the lock controller to open the door.
    #[inline]
    #[must_use]
    pub fn opens_door(self) -> bool {
        matches!(self, Role::Instructor | Role::Admin)
    }

    /// Returns `true` if this role may fall back to an administrative schedule.
    #[inline]
    #[must_use]
    pub fn has_door_access_without_class(self) -> bool {
        matches!(self, Role::Custodian | Role::Dean)
    }

    /// Returns `true` if a time-in by this role on an owned schedule starts the session.
    #[inline]
    #[must_use]
    pub fn starts_sessions(self) -> bool {
        matches!(self, Role::Instructor | Role::Admin | Role::Dean)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "instructor" | "faculty" => Ok(Role::Instructor),
            "admin" => Ok(Role::Admin),
            "custodian" => Ok(Role::Custodian),
            "dean" => Ok(Role::Dean),
            other => Err(Error::InvalidRole(other.to_string())),
        }
    }
}

/// Kind of scan stored on an attendance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    TimeIn,
    TimeOut,
    EarlyArrival,
}

impl ScanType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ScanType::TimeIn => "time_in",
            ScanType::TimeOut => "time_out",
            ScanType::EarlyArrival => "early_arrival",
        }
    }

    /// Primary scans establish the day's attendance status. At most one exists
    /// per (user, schedule, date).
    #[inline]
    #[must_use]
    pub fn is_primary(self) -> bool {
        matches!(self, ScanType::TimeIn | ScanType::EarlyArrival)
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScanType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "time_in" => Ok(ScanType::TimeIn),
            "time_out" => Ok(ScanType::TimeOut),
            "early_arrival" => Ok(ScanType::EarlyArrival),
            other => Err(Error::InvalidScanType(other.to_string())),
        }
    }
}

/// Attendance status of a record or roster row.
///
/// `AwaitingConfirmation` is the only provisional state. It becomes `Present`
/// or `Late` when the instructor starts the session, or `Present` when the
/// no-show sweep fires. `Absent` is computed by the roster and never written
/// by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Late,
    #[serde(rename = "Early Arrival")]
    EarlyArrival,
    #[serde(rename = "Awaiting Confirmation")]
    AwaitingConfirmation,
    Absent,
}

impl AttendanceStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Late => "Late",
            AttendanceStatus::EarlyArrival => "Early Arrival",
            AttendanceStatus::AwaitingConfirmation => "Awaiting Confirmation",
            AttendanceStatus::Absent => "Absent",
        }
    }

    /// Statuses that block a second primary record for the same class day.
    #[inline]
    #[must_use]
    pub fn blocks_new_primary(self) -> bool {
        !matches!(self, AttendanceStatus::Absent)
    }

    /// Counted as present in roster statistics.
    #[inline]
    #[must_use]
    pub fn is_present_equivalent(self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::EarlyArrival)
    }

    #[inline]
    #[must_use]
    pub fn is_provisional(self) -> bool {
        matches!(self, AttendanceStatus::AwaitingConfirmation)
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AttendanceStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Present" => Ok(AttendanceStatus::Present),
            "Late" => Ok(AttendanceStatus::Late),
            "Early Arrival" => Ok(AttendanceStatus::EarlyArrival),
            "Awaiting Confirmation" => Ok(AttendanceStatus::AwaitingConfirmation),
            "Absent" => Ok(AttendanceStatus::Absent),
            other => Err(Error::InvalidStatus(other.to_string())),
        }
    }
}

/// Credential used at the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Rfid,
    Fingerprint,
}

impl AuthMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AuthMethod::Rfid => "rfid",
            AuthMethod::Fingerprint => "fingerprint",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuthMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rfid" => Ok(AuthMethod::Rfid),
            "fingerprint" | "biometric" => Ok(AuthMethod::Fingerprint),
            other => Err(Error::InvalidAuthMethod(other.to_string())),
        }
    }
}

/// Side of the door the reader is mounted on.
///
/// A reader outside the room records arrivals; a reader inside records
/// departures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanLocation {
    Inside,
    #[default]
    Outside,
}

impl ScanLocation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ScanLocation::Inside => "inside",
            ScanLocation::Outside => "outside",
        }
    }

    #[inline]
    #[must_use]
    pub fn is_departure(self) -> bool {
        matches!(self, ScanLocation::Inside)
    }
}

impl fmt::Display for ScanLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScanLocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inside" => Ok(ScanLocation::Inside),
            "outside" => Ok(ScanLocation::Outside),
            other => Err(Error::InvalidLocation(other.to_string())),
        }
    }
}

/// Semester of an academic year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Semester {
    First,
    Second,
    Summer,
}

impl Semester {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Semester::First => "first",
            Semester::Second => "second",
            Semester::Summer => "summer",
        }
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Semester {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" | "1st" | "1st semester" | "1" => Ok(Semester::First),
            "second" | "2nd" | "2nd semester" | "2" => Ok(Semester::Second),
            "summer" => Ok(Semester::Summer),
            other => Err(Error::InvalidSemester(other.to_string())),
        }
    }
}

/// Academic term (year + semester) that scopes schedules and enrollments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AcademicTerm {
    /// Academic year label, e.g. `2025-2026`.
    pub year: String,
    pub semester: Semester,
}

impl AcademicTerm {
    pub fn new(year: impl Into<String>, semester: Semester) -> Self {
        Self {
            year: year.into(),
            semester,
        }
    }
}

impl fmt::Display for AcademicTerm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.year, self.semester)
    }
}

/// Full English day name as stored in the `schedules.day_of_week` column.
#[must_use]
pub fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Parse a day name stored in the database.
///
/// # Errors
/// Returns `Error::InvalidWeekday` for anything chrono cannot read as a weekday.
pub fn parse_day_name(s: &str) -> Result<Weekday> {
    s.trim()
        .parse::<Weekday>()
        .map_err(|_| Error::InvalidWeekday(s.to_string()))
}

/// Weekdays that receive an administrative schedule.
pub const SCHOOL_DAYS: [Weekday; 5] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
];

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("student", Role::Student)]
    #[case("Instructor", Role::Instructor)]
    #[case("faculty", Role::Instructor)]
    #[case("ADMIN", Role::Admin)]
    #[case("custodian", Role::Custodian)]
    #[case("dean", Role::Dean)]
    fn test_role_parse(#[case] input: &str, #[case] expected: Role) {
        assert_eq!(input.parse::<Role>().unwrap(), expected);
    }

    #[test]
    fn test_role_parse_invalid() {
        assert!(matches!(
            "janitor".parse::<Role>(),
            Err(Error::InvalidRole(_))
        ));
    }

    #[test]
    fn test_role_capabilities() {
        assert!(Role::Instructor.opens_door());
        assert!(Role::Admin.opens_door());
        assert!(!Role::Student.opens_door());
        assert!(!Role::Custodian.opens_door());

        assert!(Role::Custodian.has_door_access_without_class());
        assert!(Role::Dean.has_door_access_without_class());
        assert!(!Role::Instructor.has_door_access_without_class());
    }

    #[rstest]
    #[case(AttendanceStatus::Present)]
    #[case(AttendanceStatus::Late)]
    #[case(AttendanceStatus::EarlyArrival)]
    #[case(AttendanceStatus::AwaitingConfirmation)]
    #[case(AttendanceStatus::Absent)]
    fn test_status_text_is_stable(#[case] status: AttendanceStatus) {
        assert_eq!(status.as_str().parse::<AttendanceStatus>().unwrap(), status);

        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, format!("\"{}\"", status.as_str()));
        assert_eq!(serde_json::from_str::<AttendanceStatus>(&json).unwrap(), status);
    }

    #[test]
    fn test_status_predicates() {
        assert!(AttendanceStatus::EarlyArrival.is_present_equivalent());
        assert!(!AttendanceStatus::Late.is_present_equivalent());
        assert!(AttendanceStatus::AwaitingConfirmation.blocks_new_primary());
        assert!(!AttendanceStatus::Absent.blocks_new_primary());
        assert!(AttendanceStatus::AwaitingConfirmation.is_provisional());
    }

    #[test]
    fn test_scan_type_primary() {
        assert!(ScanType::TimeIn.is_primary());
        assert!(ScanType::EarlyArrival.is_primary());
        assert!(!ScanType::TimeOut.is_primary());
        assert_eq!("early_arrival".parse::<ScanType>().unwrap(), ScanType::EarlyArrival);
    }

    #[test]
    fn test_location_default_is_arrival_side() {
        assert_eq!(ScanLocation::default(), ScanLocation::Outside);
        assert!(ScanLocation::Inside.is_departure());
    }

    #[rstest]
    #[case("1st Semester", Semester::First)]
    #[case("second", Semester::Second)]
    #[case("Summer", Semester::Summer)]
    fn test_semester_parse(#[case] input: &str, #[case] expected: Semester) {
        assert_eq!(input.parse::<Semester>().unwrap(), expected);
    }

    #[test]
    fn test_day_names_roundtrip() {
        for day in SCHOOL_DAYS {
            assert_eq!(parse_day_name(day_name(day)).unwrap(), day);
        }
        assert!(parse_day_name("Funday").is_err());
    }

    #[test]
    fn test_term_display() {
        let term = AcademicTerm::new("2025-2026", Semester::First);
        assert_eq!(term.to_string(), "2025-2026 first");
    }
}

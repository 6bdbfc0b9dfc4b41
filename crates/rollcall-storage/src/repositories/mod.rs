pub mod attendance;
pub mod enrollment;
pub mod lease;
pub mod room;
pub mod schedule;
pub mod session;
pub mod settings;
pub mod subject;
pub mod user;

pub use attendance::{AttendanceRepository, SqliteAttendanceRepository};
pub use enrollment::{EnrollmentRepository, SqliteEnrollmentRepository};
pub use lease::{LeaseRepository, SqliteLeaseRepository};
pub use room::{RoomRepository, SqliteRoomRepository};
pub use schedule::{ScheduleRepository, SqliteScheduleRepository};
pub use session::{SessionRepository, SqliteSessionRepository};
pub use settings::{SettingsRepository, SqliteSettingsRepository};
pub use subject::{SqliteSubjectRepository, SubjectRepository};
pub use user::{SqliteUserRepository, UserRepository};

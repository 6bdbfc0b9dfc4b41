pub mod attendance_record;
pub mod enrollment;
pub mod room;
pub mod schedule;
pub mod session;
pub mod subject;
pub mod user;

pub use attendance_record::{AttendanceRecord, NewAttendanceRecord};
pub use enrollment::Enrollment;
pub use room::Room;
pub use schedule::{NewSchedule, Schedule};
pub use session::{Session, SessionStatus};
pub use subject::Subject;
pub use user::User;

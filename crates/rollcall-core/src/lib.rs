//! Domain vocabulary and pure decision logic for the Rollcall attendance engine.
//!
//! Nothing in this crate performs I/O. Storage, door-lock dispatch and the
//! engine that wires them together live in sibling crates and depend on the
//! types defined here.

pub mod classifier;
pub mod clock;
pub mod constants;
pub mod error;
pub mod policy;
pub mod session_key;
pub mod types;

pub use classifier::{Classification, Decision, EntryPoint, ExistingRecord, Rejection, ScanContext};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{Error, Result};
pub use policy::{AttendancePolicy, ScheduleWindow};
pub use session_key::SessionKey;
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

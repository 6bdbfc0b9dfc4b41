//! Door-lock collaborator for Rollcall.
//!
//! Instructors and admins open the classroom door with the same scan that
//! records their attendance. The lock controller is reached with one HTTP
//! request; everything about that request is fire-and-forget from the point
//! of view of the attendance write path.
//!
//! # Components
//!
//! - [`DoorLock`]: anything that can unlock a room
//! - [`HttpDoorLock`]: posts an unlock command to the room's controller
//! - [`MockDoorLock`]: in-memory lock that records commands, for tests
//! - [`LockDispatcher`]: spawns unlock commands with a timeout and logs failures
//!
//! # Example
//!
//! ```no_run
//! use rollcall_network::{HttpDoorLock, LockClientConfig, LockDispatcher, UnlockCommand};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LockClientConfig {
//!     timeout: Duration::from_secs(3),
//!     ..Default::default()
//! };
//!
//! let dispatcher = LockDispatcher::new(HttpDoorLock::new(config.clone())?, config.timeout);
//! dispatcher.dispatch(UnlockCommand::new("R-101", "10.0.3.14:8080", "INS001"));
//! # Ok(())
//! # }
//! ```

mod client;
mod dispatcher;
mod lock;

pub use client::{HttpDoorLock, LockClientConfig};
pub use dispatcher::LockDispatcher;
pub use lock::{DoorLock, LockError, MockDoorLock, UnlockCommand};

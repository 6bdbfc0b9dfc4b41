use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while talking to a lock controller
#[derive(Debug, Error)]
pub enum LockError {
    /// The controller did not answer in time
    #[error("Unlock timeout after {0}ms")]
    Timeout(u64),

    /// The controller address cannot form a request URL
    #[error("Invalid lock address: {0}")]
    InvalidAddress(String),

    /// The controller answered with a non-success status
    #[error("Lock controller rejected unlock with HTTP {0}")]
    Rejected(u16),

    /// Transport-level failure
    #[error("Lock request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The dispatch task did not run to completion
    #[error("Unlock task aborted: {0}")]
    Aborted(String),
}

/// One request to open a room's door.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockCommand {
    pub room: String,

    /// `host[:port]` of the controller
    #[serde(skip)]
    pub lock_address: String,

    /// Identifier of the user whose scan triggered the unlock
    pub requested_by: String,
}

impl UnlockCommand {
    pub fn new(
        room: impl Into<String>,
        lock_address: impl Into<String>,
        requested_by: impl Into<String>,
    ) -> Self {
        Self {
            room: room.into(),
            lock_address: lock_address.into(),
            requested_by: requested_by.into(),
        }
    }
}

/// A door lock that can be opened remotely.
///
/// Implementations return a `Send` future so the dispatcher can run the
/// unlock on a spawned task.
pub trait DoorLock: Send + Sync + 'static {
    fn unlock(&self, command: &UnlockCommand) -> impl Future<Output = Result<(), LockError>> + Send;
}

/// In-memory lock that records every command it receives.
///
/// Can be told to fail or to stall, to exercise the dispatcher's error and
/// timeout handling.
#[derive(Debug, Default)]
pub struct MockDoorLock {
    commands: Mutex<Vec<UnlockCommand>>,
    fail_with_status: Option<u16>,
    delay: Option<Duration>,
}

impl MockDoorLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every unlock answers with HTTP `status`
    pub fn failing(status: u16) -> Self {
        Self {
            fail_with_status: Some(status),
            ..Self::default()
        }
    }

    /// Every unlock takes `delay` before succeeding
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Commands received so far
    pub fn commands(&self) -> Vec<UnlockCommand> {
        self.commands
            .lock()
            .map(|c| c.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }
}

impl DoorLock for MockDoorLock {
    fn unlock(&self, command: &UnlockCommand) -> impl Future<Output = Result<(), LockError>> + Send {
        let delay = self.delay;
        let failure = self.fail_with_status;
        self.commands
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(command.clone());

        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            match failure {
                Some(status) => Err(LockError::Rejected(status)),
                None => Ok(()),
            }
        }
    }
}

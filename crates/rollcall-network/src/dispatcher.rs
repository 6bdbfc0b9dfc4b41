//! Fire-and-forget unlock dispatch.
//!
//! The attendance write path never waits on a door. `dispatch` spawns the
//! unlock on its own task, bounds it with a timeout and logs any failure at
//! `warn`. The returned handle may be awaited (tests do) or dropped;
//! short-lived processes call [`LockDispatcher::drain`] before exiting.

use crate::lock::{DoorLock, LockError, UnlockCommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

/// Spawns unlock commands against a [`DoorLock`].
pub struct LockDispatcher<L: DoorLock> {
    lock: Arc<L>,
    timeout: Duration,
    in_flight: TaskTracker,
}

impl<L: DoorLock> Clone for LockDispatcher<L> {
    fn clone(&self) -> Self {
        Self {
            lock: Arc::clone(&self.lock),
            timeout: self.timeout,
            in_flight: self.in_flight.clone(),
        }
    }
}

impl<L: DoorLock> LockDispatcher<L> {
    pub fn new(lock: L, timeout: Duration) -> Self {
        Self {
            lock: Arc::new(lock),
            timeout,
            in_flight: TaskTracker::new(),
        }
    }

    /// The underlying lock, for inspection
    pub fn lock(&self) -> &L {
        &self.lock
    }

    /// Unlock without blocking the caller.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn dispatch(&self, command: UnlockCommand) -> JoinHandle<Result<(), LockError>> {
        let lock = Arc::clone(&self.lock);
        let timeout = self.timeout;

        self.in_flight.spawn(async move {
            let result = match tokio::time::timeout(timeout, lock.unlock(&command)).await {
                Ok(result) => result,
                Err(_) => Err(LockError::Timeout(timeout.as_millis() as u64)),
            };

            match &result {
                Ok(()) => debug!("Unlock dispatched for room {}", command.room),
                Err(e) => warn!(
                    "Unlock for room {} (requested by {}) failed: {}",
                    command.room, command.requested_by, e
                ),
            }

            result
        })
    }

    /// Unlock and wait for the controller's answer, still bounded by the timeout
    pub async fn unlock_now(&self, command: UnlockCommand) -> Result<(), LockError> {
        self.dispatch(command)
            .await
            .map_err(|e| LockError::Aborted(e.to_string()))?
    }

    /// Wait for every unlock dispatched so far, from this handle or its clones
    pub async fn drain(&self) {
        self.in_flight.close();
        self.in_flight.wait().await;
        self.in_flight.reopen();
    }
}

//! HTTP client for room lock controllers.
//!
//! Each room with a lock carries the controller's `host[:port]`. Unlocking is
//! a single `POST {scheme}://{address}{path}` with a small JSON body; any 2xx
//! answer counts as success.

use crate::lock::{DoorLock, LockError, UnlockCommand};
use std::time::Duration;
use tracing::{debug, info};

/// Configuration for the lock controller client
///
/// # Example
///
/// ```
/// use rollcall_network::LockClientConfig;
/// use std::time::Duration;
///
/// let config = LockClientConfig {
///     timeout: Duration::from_secs(2),
///     ..Default::default()
/// };
/// assert_eq!(config.path, "/unlock");
/// ```
#[derive(Debug, Clone)]
pub struct LockClientConfig {
    /// Upper bound on one unlock request, connect included
    pub timeout: Duration,

    /// `http` or `https`
    pub scheme: String,

    /// Request path on the controller
    pub path: String,
}

impl Default for LockClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            scheme: "http".to_string(),
            path: "/unlock".to_string(),
        }
    }
}

impl LockClientConfig {
    /// Full request URL for a controller address
    pub fn url_for(&self, lock_address: &str) -> Result<String, LockError> {
        let address = lock_address.trim();
        if address.is_empty() || address.contains(char::is_whitespace) || address.contains('/') {
            return Err(LockError::InvalidAddress(lock_address.to_string()));
        }

        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };

        Ok(format!("{}://{}{}", self.scheme, address, path))
    }
}

/// Lock controller reached over HTTP.
pub struct HttpDoorLock {
    client: reqwest::Client,
    config: LockClientConfig,
}

impl HttpDoorLock {
    /// Build a client whose every request is bounded by `config.timeout`
    pub fn new(config: LockClientConfig) -> Result<Self, LockError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()?;

        debug!("Created lock client (timeout {}ms)", config.timeout.as_millis());

        Ok(Self { client, config })
    }
}

impl DoorLock for HttpDoorLock {
    async fn unlock(&self, command: &UnlockCommand) -> Result<(), LockError> {
        let url = self.config.url_for(&command.lock_address)?;
        debug!("Unlocking room {} via {}", command.room, url);

        let response = self.client.post(&url).json(command).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(LockError::Rejected(status.as_u16()));
        }

        info!("Room {} unlocked for {}", command.room, command.requested_by);
        Ok(())
    }
}

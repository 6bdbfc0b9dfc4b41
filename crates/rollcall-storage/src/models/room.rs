use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Physical room with an optional door-lock controller.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Room {
    pub id: i64,

    /// Room number as printed on the door, unique. May contain hyphens.
    pub room_number: String,

    pub name: Option<String>,

    /// `host[:port]` of the lock controller. Rooms without one are never unlocked remotely.
    pub lock_address: Option<String>,

    pub created_at: DateTime<Utc>,
}

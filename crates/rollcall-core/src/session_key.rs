//! Structured identifier of one class session: date + room + scheduled start.
//!
//! The canonical text form is `YYYY-MM-DD_ROOM_HH:MM`. The legacy hyphenated
//! form `YYYY-MM-DD-ROOM-HHMM` is still accepted. Both are parsed by anchoring
//! the fixed-width date prefix and the final time token, so room numbers that
//! themselves contain hyphens or underscores survive a round trip.

use crate::constants::{LEGACY_SESSION_KEY_SEPARATOR, SESSION_KEY_DATE_LEN, SESSION_KEY_SEPARATOR};
use crate::{Result, error::Error};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub date: NaiveDate,
    pub room: String,
    pub start: NaiveTime,
}

impl SessionKey {
    /// # Errors
    /// Returns `Error::InvalidSessionKey` if `room` is blank.
    pub fn new(date: NaiveDate, room: impl Into<String>, start: NaiveTime) -> Result<Self> {
        let room = room.into().trim().to_string();
        if room.is_empty() {
            return Err(Error::InvalidSessionKey("room number is empty".to_string()));
        }
        Ok(Self { date, room, start })
    }

    /// Scheduled start formatted as stored in the schedules table.
    #[must_use]
    pub fn start_hms(&self) -> String {
        self.start.format("%H:%M:%S").to_string()
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.date.format("%Y-%m-%d"),
            self.room,
            self.start.format("%H:%M"),
            sep = SESSION_KEY_SEPARATOR
        )
    }
}

impl std::str::FromStr for SessionKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let malformed = || Error::InvalidSessionKey(s.to_string());

        let date_part = s.get(..SESSION_KEY_DATE_LEN).ok_or_else(malformed)?;
        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| malformed())?;

        let rest = &s[SESSION_KEY_DATE_LEN..];
        let sep = rest.chars().next().ok_or_else(malformed)?;
        if sep != SESSION_KEY_SEPARATOR && sep != LEGACY_SESSION_KEY_SEPARATOR {
            return Err(malformed());
        }

        let (room, time) = rest[sep.len_utf8()..]
            .rsplit_once(sep)
            .ok_or_else(malformed)?;

        let start = parse_start_time(time).ok_or_else(malformed)?;
        SessionKey::new(date, room, start).map_err(|_| malformed())
    }
}

fn parse_start_time(token: &str) -> Option<NaiveTime> {
    ["%H:%M", "%H:%M:%S", "%H%M"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(token, fmt).ok())
}

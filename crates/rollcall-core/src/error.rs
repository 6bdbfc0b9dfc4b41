use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Invalid attendance status: {0}")]
    InvalidStatus(String),

    #[error("Invalid scan type: {0}")]
    InvalidScanType(String),

    #[error("Invalid authentication method: {0}")]
    InvalidAuthMethod(String),

    #[error("Invalid scan location: {0}")]
    InvalidLocation(String),

    #[error("Invalid semester: {0}")]
    InvalidSemester(String),

    #[error("Invalid day of week: {0}")]
    InvalidWeekday(String),

    #[error("Invalid time of day: {0}")]
    InvalidTime(String),

    #[error("Malformed session key: {0}")]
    InvalidSessionKey(String),

    #[error("Invalid schedule window: {start} is not before {end}")]
    InvalidWindow { start: String, end: String },
}

pub type Result<T> = std::result::Result<T, Error>;

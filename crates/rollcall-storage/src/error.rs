use thiserror::Error;

/// Storage-specific error types for the Rollcall attendance engine.
///
/// These represent failures in database access and in decoding rows back
/// into domain types. Attendance-level failures (conflicts, forbidden scans)
/// are not storage errors; see the engine crate.
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite rejected the query or the pool could not hand out a connection
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The embedded schema could not be applied
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A row addressed by key does not exist
    #[error("Entity not found: {entity_type} with {field}={value}")]
    NotFound {
        entity_type: String,
        field: String,
        value: String,
    },

    /// A stored value does not decode into its domain type
    #[error("Invalid stored value: {0}")]
    Domain(#[from] rollcall_core::Error),

    /// Input rejected before it reached SQLite
    #[error("Validation error: {0}")]
    Validation(String),

    /// Bad database path or pool settings
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl StorageError {
    pub fn not_found(
        entity_type: impl Into<String>,
        field: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            field: field.into(),
            value: value.to_string(),
        }
    }

    /// Returns `true` if the underlying database error is a unique-constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            StorageError::Database(sqlx::Error::Database(db)) if db.is_unique_violation()
        )
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

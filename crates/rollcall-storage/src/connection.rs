//! Pool setup for the attendance database.
//!
//! Scans from many readers write concurrently, so file databases always run in
//! WAL mode with a busy timeout: a writer that finds the database locked waits
//! instead of failing, and the unique indexes decide who wins.

use crate::error::{StorageError, StorageResult};
use sqlx::ConnectOptions;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Where the attendance database lives and how the pool around it behaves.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// SQLite file; parent directories are created on open
    pub database_path: String,

    pub max_connections: u32,
    pub min_connections: u32,

    /// Wait for a free connection at most this long
    pub acquire_timeout: Duration,

    /// Wait on a locked database at most this long before `SQLITE_BUSY`
    pub busy_timeout: Duration,

    pub create_if_missing: bool,

    /// Apply embedded migrations when opening
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_path: "rollcall.db".to_string(),
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(10),
            create_if_missing: true,
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    pub fn new(database_path: impl Into<String>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Default::default()
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    pub fn auto_migrate(mut self, migrate: bool) -> Self {
        self.auto_migrate = migrate;
        self
    }

    /// Connection options for the configured file.
    fn connect_options(&self) -> StorageResult<SqliteConnectOptions> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", self.database_path))
            .map_err(|e| {
                StorageError::Configuration(format!(
                    "invalid database path {}: {}",
                    self.database_path, e
                ))
            })?;

        Ok(options
            .create_if_missing(self.create_if_missing)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(self.busy_timeout)
            .disable_statement_logging())
    }

    fn ensure_parent_dir(&self) -> StorageResult<()> {
        let Some(parent) = Path::new(&self.database_path).parent() else {
            return Ok(());
        };
        if parent.as_os_str().is_empty() || parent.exists() {
            return Ok(());
        }

        std::fs::create_dir_all(parent).map_err(|e| {
            StorageError::Configuration(format!(
                "cannot create database directory {}: {}",
                parent.display(),
                e
            ))
        })?;
        debug!("Created database directory {}", parent.display());
        Ok(())
    }
}

/// Shared handle to the attendance database. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the database file described by `config`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rollcall_storage::connection::{Database, DatabaseConfig};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let db = Database::new(DatabaseConfig::new("var/rollcall.db").max_connections(4)).await?;
    /// db.health_check().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(config: DatabaseConfig) -> StorageResult<Self> {
        config.ensure_parent_dir()?;

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(config.connect_options()?)
            .await?;

        info!(
            "Opened attendance database {} ({} connections max, busy timeout {}ms)",
            config.database_path,
            config.max_connections,
            config.busy_timeout.as_millis()
        );

        let db = Self { pool };
        if config.auto_migrate {
            db.migrate().await?;
        }
        Ok(db)
    }

    /// Fresh, migrated in-memory database for tests.
    ///
    /// Every connection to `:memory:` would see its own empty database, so the
    /// pool is pinned to one connection.
    pub async fn in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .foreign_keys(true)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Apply the schema embedded from the workspace `migrations/` directory.
    pub async fn migrate(&self) -> StorageResult<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        debug!(
            "Attendance schema at {} migrations",
            self.applied_migrations().await?
        );
        Ok(())
    }

    /// Number of migrations recorded as applied.
    pub async fn applied_migrations(&self) -> StorageResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for checked-out connections to return, then close them.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

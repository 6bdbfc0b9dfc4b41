//! rollcall - attendance engine command line
//!
//! Runs the no-show sweep worker and exposes the engine's entry points for
//! door readers, kiosks and operators. Every command prints JSON on stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rollcall_core::{Clock, ScanLocation, SystemClock};
use rollcall_engine::{
    AttendanceService, Credential, EarlyArrivalRequest, NoShowSweep, ScanRequest, SweepWorker,
};
use rollcall_network::{HttpDoorLock, LockDispatcher};
use rollcall_storage::repositories::{SettingsRepository, SqliteSettingsRepository};
use rollcall_storage::Database;
use serde::Serialize;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod config;

use config::Config;

/// rollcall - attendance resolution and reconciliation
#[derive(Parser, Debug)]
#[command(name = "rollcall")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "rollcall.toml", env = "ROLLCALL_CONFIG")]
    config: PathBuf,

    /// SQLite database path (overrides the config file)
    #[arg(long, env = "ROLLCALL_DATABASE")]
    database: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "ROLLCALL_LOG")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply schema migrations and exit
    Migrate,

    /// Run the no-show sweep every interval until interrupted
    Worker,

    /// Run the no-show sweep once, ignoring the worker lease
    Sweep,

    #[command(flatten)]
    Service(ServiceCommand),
}

/// Commands served by [`AttendanceService`]
#[derive(Subcommand, Debug)]
enum ServiceCommand {
    /// Submit a door scan
    Scan {
        #[command(flatten)]
        credential: CredentialArgs,

        /// Room id
        #[arg(long)]
        room: i64,

        /// Record against this subject instead of resolving by role
        #[arg(long)]
        subject: Option<i64>,

        /// Scan came from the reader inside the room (departure)
        #[arg(long)]
        inside: bool,
    },

    /// Submit a student's early-arrival scan
    EarlyArrival {
        #[command(flatten)]
        credential: CredentialArgs,

        /// Room id
        #[arg(long)]
        room: i64,
    },

    /// Print the roster for a class session (`YYYY-MM-DD_ROOM_HH:MM`)
    Roster {
        session_key: String,
    },

    /// End today's active session of a schedule
    EndSession {
        schedule_id: i64,
    },

    /// Open a room's door
    Unlock {
        /// Room id
        #[arg(long)]
        room: i64,

        /// Who asked for the unlock
        #[arg(long, default_value = "operator")]
        by: String,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct CredentialArgs {
    /// RFID tag or institutional number
    #[arg(long)]
    rfid: Option<String>,

    /// Enrolled fingerprint slot
    #[arg(long)]
    fingerprint: Option<i64>,
}

impl CredentialArgs {
    fn credential(&self) -> Result<Credential> {
        match (&self.rfid, self.fingerprint) {
            (Some(rfid), _) => Ok(Credential::Rfid(rfid.clone())),
            (None, Some(slot)) => Ok(Credential::Fingerprint(slot)),
            (None, None) => anyhow::bail!("either --rfid or --fingerprint is required"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(&cli.log_level))),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load(&cli.config)?;
    let db = Database::new(config.database(cli.database.as_deref()))
        .await
        .context("Failed to open attendance database")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let result = run(cli.command, &config, &db, clock).await;
    db.close().await;
    result
}

async fn run(command: Commands, config: &Config, db: &Database, clock: Arc<dyn Clock>) -> Result<()> {
    match command {
        Commands::Migrate => {
            db.health_check().await?;
            let applied = db.applied_migrations().await?;
            info!("Database is up to date");
            print_json(&serde_json::json!({ "applied_migrations": applied }))
        }
        Commands::Worker => {
            let worker = SweepWorker::new(db.pool().clone(), clock, config.sweep());
            let cancel = CancellationToken::new();

            tokio::spawn({
                let cancel = cancel.clone();
                async move {
                    shutdown_signal().await;
                    cancel.cancel();
                }
            });

            worker.run(cancel).await;
            Ok(())
        }
        Commands::Sweep => {
            let term = SqliteSettingsRepository::new(db.pool().clone())
                .current_term()
                .await?;
            let report = NoShowSweep::new(db.pool().clone())
                .lookback_days(config.sweep().lookback_days)
                .run(clock.now(), &term)
                .await?;
            print_json(&report)
        }
        Commands::Service(command) => {
            let service = AttendanceService::new(db.pool().clone(), clock, doors(config)?);
            let result = serve(command, &service).await;
            service.drain_doors().await;
            result
        }
    }
}

async fn serve(command: ServiceCommand, service: &AttendanceService) -> Result<()> {
    match command {
        ServiceCommand::Scan {
            credential,
            room,
            subject,
            inside,
        } => {
            let receipt = service
                .submit_scan(ScanRequest {
                    credential: credential.credential()?,
                    room_id: room,
                    subject_id: subject,
                    location: if inside {
                        ScanLocation::Inside
                    } else {
                        ScanLocation::Outside
                    },
                })
                .await?;
            print_json(&receipt)
        }
        ServiceCommand::EarlyArrival { credential, room } => {
            let receipt = service
                .early_arrival_scan(EarlyArrivalRequest {
                    credential: credential.credential()?,
                    room_id: room,
                })
                .await?;
            print_json(&receipt)
        }
        ServiceCommand::Roster { session_key } => print_json(&service.roster(&session_key).await?),
        ServiceCommand::EndSession { schedule_id } => {
            let session_id = service.end_session(schedule_id).await?;
            print_json(&serde_json::json!({ "session_id": session_id, "status": "ended" }))
        }
        ServiceCommand::Unlock { room, by } => {
            service.unlock_room(room, &by).await?;
            print_json(&serde_json::json!({ "room_id": room, "unlocked": true }))
        }
    }
}

fn doors(config: &Config) -> Result<Option<LockDispatcher<HttpDoorLock>>> {
    if !config.lock.enabled {
        warn!("Door unlocks are disabled in configuration");
        return Ok(None);
    }

    let client_config = config.lock_client();
    let timeout = client_config.timeout;
    let lock = HttpDoorLock::new(client_config).context("Failed to build lock client")?;
    Ok(Some(LockDispatcher::new(lock, timeout)))
}

/// The level applies to this workspace's crates only; dependencies stay at `warn`.
fn default_filter(level: &str) -> String {
    ["rollcall", "rollcall_engine", "rollcall_storage", "rollcall_network"]
        .iter()
        .fold("warn".to_string(), |filter, target| {
            format!("{filter},{target}={level}")
        })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_scan_requires_one_credential() {
        let parsed = Cli::try_parse_from(["rollcall", "scan", "--room", "1", "--rfid", "STU001"]);
        assert!(parsed.is_ok());

        let missing = Cli::try_parse_from(["rollcall", "scan", "--room", "1"]);
        assert!(missing.is_err());

        let both = Cli::try_parse_from([
            "rollcall", "scan", "--room", "1", "--rfid", "STU001", "--fingerprint", "7",
        ]);
        assert!(both.is_err());
    }

    #[test]
    fn test_roster_takes_session_key() {
        let cli = Cli::try_parse_from(["rollcall", "roster", "2025-03-10_R-101_08:00"]).unwrap();
        match cli.command {
            Commands::Service(ServiceCommand::Roster { session_key }) => {
                assert_eq!(session_key, "2025-03-10_R-101_08:00")
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_default_filter_scopes_level() {
        assert_eq!(
            default_filter("debug"),
            "warn,rollcall=debug,rollcall_engine=debug,rollcall_storage=debug,rollcall_network=debug"
        );
    }
}

//! One-shot control utility for the shared region
//!
//! Opens an existing region and either latches a stop request into the
//! top-level slot or prints per-slot status. Performs no polling and no
//! acknowledgment wait: the stop command succeeds when the flag write
//! succeeds, regardless of whether the target process has stopped yet.

use alcor_cli::{run_status, run_stop};
use alcor_core::config::{load_settings_from_toml_path, SettingsFile};
use alcor_core::util::default_region_path;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::error;

#[derive(Parser)]
#[command(name = "alcor")]
#[command(about = "Control utility for the alcor shared-memory region")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path of the shared region file (default: $ALCOR_SHARED_FILE or the
    /// system temp directory)
    #[arg(long)]
    path: Option<PathBuf>,

    /// Number of slots in the region
    #[arg(long)]
    slots: Option<usize>,

    /// Bytes per slot
    #[arg(long = "slot-size")]
    slot_size: Option<usize>,

    /// Optional TOML settings file; explicit flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Request a cooperative stop of the top-level process (slot 0)
    Stop,
    /// Print per-slot lifecycle and liveness state
    Status {
        /// Print as JSON instead of a table
        #[arg(long)]
        json: bool,
        /// Heartbeat age beyond which a slot is reported stale, milliseconds
        #[arg(long = "liveness-timeout-ms")]
        liveness_timeout_ms: Option<u64>,
    },
}

/// Resolved region location, geometry and liveness timeout
struct Resolved {
    path: PathBuf,
    slot_count: usize,
    slot_size: usize,
    liveness_timeout: Duration,
}

fn resolve(cli: &Cli, liveness_timeout_ms: Option<u64>) -> alcor_cli::Result<Resolved> {
    let settings = match &cli.config {
        Some(path) => load_settings_from_toml_path(path)?,
        None => SettingsFile::default(),
    };
    Ok(Resolved {
        path: cli
            .path
            .clone()
            .or_else(|| cli.config.as_ref().map(|_| settings.region.path.clone()))
            .unwrap_or_else(default_region_path),
        slot_count: cli.slots.unwrap_or(settings.region.slot_count),
        slot_size: cli.slot_size.unwrap_or(settings.region.slot_size),
        liveness_timeout: Duration::from_millis(
            liveness_timeout_ms.unwrap_or(settings.timing.liveness_timeout_ms),
        ),
    })
}

fn run(cli: &Cli) -> alcor_cli::Result<()> {
    match &cli.command {
        Commands::Stop => {
            let resolved = resolve(cli, None)?;
            run_stop(&resolved.path, resolved.slot_count, resolved.slot_size)
        }
        Commands::Status {
            json,
            liveness_timeout_ms,
        } => {
            let resolved = resolve(cli, *liveness_timeout_ms)?;
            run_status(
                &resolved.path,
                resolved.slot_count,
                resolved.slot_size,
                resolved.liveness_timeout,
                *json,
            )
        }
    }
}

fn main() -> ExitCode {
    if let Err(e) = alcor_core::utils::init_tracing("warn") {
        eprintln!("Failed to initialize tracing: {}", e);
    }

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{} ({})", e, e.code());
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

//! Library surface of the one-shot control utility
//!
//! The stop path is the minimal client of the protocol: open the existing
//! region read-write, latch one flag into the top-level slot and exit.
//! Success reflects the write alone, not the target process stopping; a
//! caller that needs a hard guarantee pairs the stop with an external
//! forced-kill path after a liveness timeout.

pub mod error;

pub use error::{CliError, Result};

use alcor_core::util::unix_millis;
use alcor_core::Controller;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Open the region and latch STOP_REQUESTED for the top-level slot (slot 0).
pub fn run_stop(path: &Path, slot_count: usize, slot_size: usize) -> Result<()> {
    let controller = Controller::open(path, slot_count, slot_size)?;
    controller.request_stop_app()?;
    info!("stop flag written to {}", path.display());
    println!("✓ stop requested for app slot in {}", path.display());
    Ok(())
}

/// Print the status of every slot, either as a table or as JSON.
pub fn run_status(
    path: &Path,
    slot_count: usize,
    slot_size: usize,
    liveness_timeout: Duration,
    json: bool,
) -> Result<()> {
    let controller = Controller::open(path, slot_count, slot_size)?;
    let snapshot = controller.snapshot(liveness_timeout)?;

    if json {
        let rendered = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| CliError::CommandFailed(format!("failed to render status: {}", e)))?;
        println!("{}", rendered);
        return Ok(());
    }

    println!(
        "{:>4}  {:>5}  {:>11}  {:>9}  {:>9}  ping-age",
        "slot", "up", "operational", "stop-req", "stale"
    );
    for status in &snapshot {
        let age = if status.up {
            let secs = unix_millis().saturating_sub(status.last_ping_ms) / 1000;
            humantime::format_duration(Duration::from_secs(secs)).to_string()
        } else {
            "-".to_string()
        };
        println!(
            "{:>4}  {:>5}  {:>11}  {:>9}  {:>9}  {}",
            status.index, status.up, status.operational, status.stop_requested, status.stale, age
        );
    }
    Ok(())
}

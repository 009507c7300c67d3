//! Shared-memory process control protocol
//!
//! Coordinates lifecycle and health state between a supervising process and a
//! small, fixed set of worker processes through a memory-mapped backing file
//! rather than sockets or pipes. Each managed process owns one fixed-size
//! slot; the owner publishes UP/OPERATIONAL flags and a heartbeat, while
//! controllers latch a STOP_REQUESTED flag and assess liveness by polling.
//! The protocol is lock-free: every field has a single writer except
//! STOP_REQUESTED, which is idempotent and latch-only.
//!
//! The byte layout in [`layout`] is the wire format; all participants must
//! agree on it exactly.

pub mod config;
pub mod controller;
pub mod error;
pub mod handle;
pub mod layout;
pub mod region;
pub mod slot;
pub mod util;

pub use config::{RegionSettings, SettingsFile, TimingSettings};
pub use controller::{Controller, Liveness, SlotStatus};
pub use error::{CoreError, Result};
pub use handle::{ProcessHandle, ProcessState};
pub use region::SharedRegion;
pub use slot::SlotView;

/// Core utilities and helper functions
pub mod utils {
    use tracing::info;

    /// Initialize tracing for the application
    pub fn init_tracing(level: &str) -> crate::Result<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| crate::CoreError::InitializationError(e.to_string()))?;

        info!("Tracing initialized with level: {}", level);
        Ok(())
    }
}

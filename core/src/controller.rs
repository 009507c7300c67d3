//! Controller side of the protocol
//!
//! A controller is any participant that writes STOP_REQUESTED or reads
//! liveness fields without owning the slot: the supervisor itself, or a
//! one-shot external utility. Controllers never block for acknowledgment; a
//! stop request only latches the flag, and a caller that needs to know when
//! the process actually exited polls UP separately (see
//! [`Controller::wait_down`]).
//!
//! By convention a controller only ever targets slot 0 directly; the
//! top-level process cascades shutdown to whatever it supervises.

use crate::layout::{FlagField, APP_SLOT};
use crate::region::SharedRegion;
use crate::util::unix_millis;
use crate::Result;
use schemars::JsonSchema;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Liveness verdict for one slot
///
/// `Stale` is advisory, never an error: it signals that the controller
/// should consider the process hung and may escalate to a forced
/// termination outside this protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// UP is clear; the process has exited or never started
    Down,
    /// UP is set and the heartbeat is within the timeout
    Alive {
        /// Age of the last observed heartbeat
        age: Duration,
    },
    /// UP is set but the heartbeat is older than the timeout
    Stale {
        /// Age of the last observed heartbeat
        age: Duration,
    },
}

impl Liveness {
    /// Whether this verdict should trigger escalation
    pub fn is_stale(&self) -> bool {
        matches!(self, Liveness::Stale { .. })
    }
}

/// Point-in-time view of one slot's control fields
#[derive(Debug, Clone, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SlotStatus {
    /// Slot index
    pub index: usize,
    /// UP flag
    pub up: bool,
    /// OPERATIONAL flag
    pub operational: bool,
    /// STOP_REQUESTED flag
    pub stop_requested: bool,
    /// Last heartbeat timestamp in ms since the Unix epoch (advisory read)
    pub last_ping_ms: u64,
    /// Whether the heartbeat was older than the liveness timeout while UP
    pub stale: bool,
}

/// Supervisor / external-utility view over a shared region
pub struct Controller {
    region: SharedRegion,
}

impl Controller {
    /// Wrap an already-mapped region
    pub fn new(region: SharedRegion) -> Self {
        Self { region }
    }

    /// Open an existing region read-write
    pub fn open(path: impl AsRef<Path>, slot_count: usize, slot_size: usize) -> Result<Self> {
        Ok(Self::new(SharedRegion::open(path, slot_count, slot_size)?))
    }

    /// The underlying region
    pub fn region(&self) -> &SharedRegion {
        &self.region
    }

    /// Latch STOP_REQUESTED for the given slot.
    ///
    /// Idempotent; setting an already-set flag is a no-op. Does not wait for
    /// the owning process to observe the request or exit.
    pub fn request_stop(&self, index: usize) -> Result<()> {
        let slot = self.region.slot(index)?;
        slot.set_flag(FlagField::StopRequested, true);
        info!("stop requested for slot {}", index);
        Ok(())
    }

    /// Request shutdown of the top-level process (slot 0), which is
    /// responsible for cascading the stop to the processes it supervises.
    pub fn request_stop_app(&self) -> Result<()> {
        self.request_stop(APP_SLOT)
    }

    /// Read the UP flag
    pub fn is_up(&self, index: usize) -> Result<bool> {
        Ok(self.region.slot(index)?.flag(FlagField::Up))
    }

    /// Read the OPERATIONAL flag
    pub fn is_operational(&self, index: usize) -> Result<bool> {
        Ok(self.region.slot(index)?.flag(FlagField::Operational))
    }

    /// Read the STOP_REQUESTED flag
    pub fn stop_requested(&self, index: usize) -> Result<bool> {
        Ok(self.region.slot(index)?.flag(FlagField::StopRequested))
    }

    /// Assess liveness of a slot from its heartbeat.
    ///
    /// A single heartbeat read can be torn and is advisory only; callers
    /// deciding on escalation should observe `Stale` across successive polls
    /// rather than acting on one reading.
    pub fn liveness(&self, index: usize, timeout: Duration) -> Result<Liveness> {
        let slot = self.region.slot(index)?;
        if !slot.flag(FlagField::Up) {
            return Ok(Liveness::Down);
        }
        let age = Duration::from_millis(unix_millis().saturating_sub(slot.ping()));
        if age > timeout {
            Ok(Liveness::Stale { age })
        } else {
            Ok(Liveness::Alive { age })
        }
    }

    /// Snapshot one slot's control fields
    pub fn status(&self, index: usize, liveness_timeout: Duration) -> Result<SlotStatus> {
        let slot = self.region.slot(index)?;
        let up = slot.flag(FlagField::Up);
        let last_ping_ms = slot.ping();
        let age = unix_millis().saturating_sub(last_ping_ms);
        Ok(SlotStatus {
            index,
            up,
            operational: slot.flag(FlagField::Operational),
            stop_requested: slot.flag(FlagField::StopRequested),
            last_ping_ms,
            stale: up && age > liveness_timeout.as_millis() as u64,
        })
    }

    /// Snapshot every slot in the region
    pub fn snapshot(&self, liveness_timeout: Duration) -> Result<Vec<SlotStatus>> {
        (0..self.region.slot_count())
            .map(|index| self.status(index, liveness_timeout))
            .collect()
    }

    /// Poll UP until it clears or `timeout` elapses.
    ///
    /// Returns `true` once the slot went down. On `false` the process is
    /// still up after the deadline and the caller may escalate to a forced
    /// kill outside this protocol.
    pub async fn wait_down(&self, index: usize, timeout: Duration, poll: Duration) -> Result<bool> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if !self.is_up(index)? {
                debug!("slot {} is down", index);
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                debug!("slot {} still up after {:?}", index, timeout);
                return Ok(false);
            }
            tokio::time::sleep(poll).await;
        }
    }
}

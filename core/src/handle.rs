//! Supervised-process side of the protocol
//!
//! A [`ProcessHandle`] owns exactly one slot and moves through the lifecycle
//!
//! ```text
//! INIT → STARTING → LIVE → STOPPING → DOWN
//! ```
//!
//! Only the owning process writes UP, OPERATIONAL and PING; the STOP_REQUESTED
//! flag is observed by polling and is never cleared by a running process.
//! While LIVE (and through STOPPING) a background task refreshes the
//! heartbeat; the refresh period must stay materially shorter than whatever
//! liveness timeout a controller applies.

use crate::layout::FlagField;
use crate::region::SharedRegion;
use crate::util::unix_millis;
use crate::{CoreError, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Lifecycle state of a slot-owning process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Slot assigned and region opened, no flags written yet
    Init,
    /// UP is set, readiness work still in progress
    Starting,
    /// OPERATIONAL is set and the heartbeat refresher is running
    Live,
    /// Shutdown in progress, OPERATIONAL cleared
    Stopping,
    /// UP cleared; terminal, the slot is not reused by this instance
    Down,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessState::Init => "init",
            ProcessState::Starting => "starting",
            ProcessState::Live => "live",
            ProcessState::Stopping => "stopping",
            ProcessState::Down => "down",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct Heartbeat {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// One managed process's claim on a slot
#[derive(Debug)]
pub struct ProcessHandle {
    region: Arc<SharedRegion>,
    index: usize,
    state: ProcessState,
    heartbeat_interval: Duration,
    poll_interval: Duration,
    last_ping: u64,
    heartbeat: Option<Heartbeat>,
}

impl ProcessHandle {
    /// Claim a slot index on an opened region.
    ///
    /// Fails with `OutOfRange` for an invalid index. A process that cannot
    /// claim its slot cannot participate in supervision and should treat the
    /// error as fatal to startup.
    pub fn claim(
        region: Arc<SharedRegion>,
        index: usize,
        heartbeat_interval: Duration,
        poll_interval: Duration,
    ) -> Result<Self> {
        region.slot(index)?;
        debug!("claimed slot {} in {}", index, region.path().display());
        Ok(Self {
            region,
            index,
            state: ProcessState::Init,
            heartbeat_interval,
            poll_interval,
            last_ping: 0,
            heartbeat: None,
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Claimed slot index
    pub fn index(&self) -> usize {
        self.index
    }

    fn expect_state(&self, expected: ProcessState, action: &str) -> Result<()> {
        if self.state != expected {
            return Err(CoreError::InvalidTransition(format!(
                "cannot {} from state {} (expected {})",
                action, self.state, expected
            )));
        }
        Ok(())
    }

    /// INIT → STARTING: announce the process as up.
    ///
    /// Writes the first heartbeat before setting UP, so an observer that sees
    /// UP always sees a plausible PING.
    pub fn start(&mut self) -> Result<()> {
        self.expect_state(ProcessState::Init, "start")?;
        let slot = self.region.slot(self.index)?;
        slot.set_flag(FlagField::Operational, false);
        self.last_ping = unix_millis().max(self.last_ping);
        slot.set_ping(self.last_ping);
        slot.set_flag(FlagField::Up, true);
        self.state = ProcessState::Starting;
        debug!("slot {}: starting", self.index);
        Ok(())
    }

    /// Refresh the heartbeat by hand, before the background refresher exists.
    ///
    /// Clamped against the previous value so PING stays non-decreasing even
    /// if the wall clock steps backwards.
    pub fn refresh_ping(&mut self) -> Result<()> {
        self.expect_state(ProcessState::Starting, "refresh_ping")?;
        let slot = self.region.slot(self.index)?;
        self.last_ping = unix_millis().max(self.last_ping);
        slot.set_ping(self.last_ping);
        Ok(())
    }

    /// STARTING → LIVE: readiness work is done, start serving.
    ///
    /// Sets OPERATIONAL and spawns the background heartbeat refresher.
    pub fn mark_live(&mut self) -> Result<()> {
        self.expect_state(ProcessState::Starting, "mark_live")?;
        let slot = self.region.slot(self.index)?;
        slot.set_flag(FlagField::Operational, true);
        self.spawn_heartbeat();
        self.state = ProcessState::Live;
        debug!("slot {}: live", self.index);
        Ok(())
    }

    fn spawn_heartbeat(&mut self) {
        let (shutdown, mut rx) = watch::channel(false);
        let region = Arc::clone(&self.region);
        let index = self.index;
        let period = self.heartbeat_interval;
        let mut last = self.last_ping;

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = rx.changed() => break,
                    _ = ticker.tick() => match region.slot(index) {
                        Ok(slot) => {
                            last = unix_millis().max(last);
                            slot.set_ping(last);
                        }
                        Err(e) => {
                            // Non-fatal: the controller will perceive the
                            // process as dead once heartbeats stop.
                            warn!("heartbeat write for slot {} failed: {}", index, e);
                        }
                    },
                }
            }
        });
        self.heartbeat = Some(Heartbeat { shutdown, task });
    }

    /// Whether a controller has requested shutdown of this slot
    pub fn stop_requested(&self) -> Result<bool> {
        Ok(self.region.slot(self.index)?.flag(FlagField::StopRequested))
    }

    /// Wait until a controller requests shutdown of this slot.
    ///
    /// Polls at the configured poll interval; visibility of a stop request is
    /// only guaranteed by the next poll, there is no push notification.
    pub async fn wait_for_stop(&self) -> Result<()> {
        loop {
            if self.stop_requested()? {
                debug!("slot {}: stop request observed", self.index);
                return Ok(());
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// STARTING/LIVE → STOPPING: clear OPERATIONAL immediately so controllers
    /// stop routing new work to this process. Idempotent once STOPPING.
    pub fn begin_stopping(&mut self) -> Result<()> {
        match self.state {
            ProcessState::Starting | ProcessState::Live => {}
            ProcessState::Stopping => return Ok(()),
            other => {
                return Err(CoreError::InvalidTransition(format!(
                    "cannot begin_stopping from state {}",
                    other
                )))
            }
        }
        let slot = self.region.slot(self.index)?;
        slot.set_flag(FlagField::Operational, false);
        self.state = ProcessState::Stopping;
        debug!("slot {}: stopping", self.index);
        Ok(())
    }

    /// STOPPING → DOWN: stop the heartbeat refresher, then clear UP as the
    /// final write to the slot. DOWN is terminal; a restarted process obtains
    /// a fresh claim (or the same index only after the region is recreated).
    pub async fn finish(&mut self) -> Result<()> {
        self.expect_state(ProcessState::Stopping, "finish")?;
        if let Some(hb) = self.heartbeat.take() {
            let _ = hb.shutdown.send(true);
            let _ = hb.task.await;
        }
        let slot = self.region.slot(self.index)?;
        slot.set_flag(FlagField::Up, false);
        self.state = ProcessState::Down;
        debug!("slot {}: down", self.index);
        Ok(())
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        // A handle dropped mid-life must not keep refreshing the heartbeat
        if let Some(hb) = self.heartbeat.take() {
            hb.task.abort();
        }
    }
}

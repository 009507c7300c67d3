//! End-to-end protocol scenarios across independently mapped regions
//!
//! Each participant opens its own mapping of the same backing file, the way
//! separate operating-system processes would: the supervisor creates the
//! region, the supervised process claims a slot through one mapping, and the
//! controller observes it through another.

use alcor_core::layout::{FlagField, APP_SLOT, SLOT_COUNT, SLOT_SIZE};
use alcor_core::util::unix_millis;
use alcor_core::{Controller, CoreError, Liveness, ProcessHandle, ProcessState, SharedRegion};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

const HEARTBEAT: Duration = Duration::from_millis(20);
const POLL: Duration = Duration::from_millis(10);
const LIVENESS_TIMEOUT: Duration = Duration::from_secs(10);

/// Supervisor-side setup: create the region and keep the tempdir alive
fn create_region(slot_count: usize, slot_size: usize) -> (TempDir, PathBuf) {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("sharedmemory");
    let region = SharedRegion::create(&path, slot_count, slot_size).expect("create region");
    drop(region);
    (dir, path)
}

/// Process-side participant: an independent mapping plus a claimed slot
fn claim(path: &PathBuf, index: usize) -> ProcessHandle {
    let region = Arc::new(SharedRegion::open(path, SLOT_COUNT, SLOT_SIZE).expect("open region"));
    ProcessHandle::claim(region, index, HEARTBEAT, POLL).expect("claim slot")
}

/// Scenario A: a freshly created region reads as not up, not operational
#[test]
fn fresh_region_reads_all_clear() {
    let (_dir, path) = create_region(10, 50);
    let controller = Controller::open(&path, 10, 50).expect("open controller");

    assert!(!controller.is_up(0).unwrap());
    assert!(!controller.is_operational(0).unwrap());
    assert!(!controller.stop_requested(0).unwrap());
    assert_eq!(controller.liveness(0, LIVENESS_TIMEOUT).unwrap(), Liveness::Down);
}

/// Scenario B: STARTING is visible as up-but-not-operational, LIVE flips
/// OPERATIONAL, each through a separate mapping
#[tokio::test]
async fn startup_transitions_are_visible_to_controller() {
    let (_dir, path) = create_region(SLOT_COUNT, SLOT_SIZE);
    let controller = Controller::open(&path, SLOT_COUNT, SLOT_SIZE).unwrap();
    let mut handle = claim(&path, APP_SLOT);

    assert_eq!(handle.state(), ProcessState::Init);
    assert!(!controller.is_up(APP_SLOT).unwrap());

    handle.start().unwrap();
    assert!(controller.is_up(APP_SLOT).unwrap());
    assert!(!controller.is_operational(APP_SLOT).unwrap());

    handle.mark_live().unwrap();
    assert!(controller.is_up(APP_SLOT).unwrap());
    assert!(controller.is_operational(APP_SLOT).unwrap());

    handle.begin_stopping().unwrap();
    handle.finish().await.unwrap();
}

/// Scenario C: a stop request is observed on poll, the handle walks
/// LIVE → STOPPING → DOWN, and the controller sees the slot go down
#[tokio::test]
async fn cooperative_stop_round_trip() {
    let (_dir, path) = create_region(SLOT_COUNT, SLOT_SIZE);
    let controller = Controller::open(&path, SLOT_COUNT, SLOT_SIZE).unwrap();
    let mut handle = claim(&path, APP_SLOT);

    handle.start().unwrap();
    handle.mark_live().unwrap();

    controller.request_stop(APP_SLOT).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle.wait_for_stop())
        .await
        .expect("stop request must be observed")
        .unwrap();

    handle.begin_stopping().unwrap();
    assert!(controller.is_up(APP_SLOT).unwrap());
    assert!(!controller.is_operational(APP_SLOT).unwrap());

    handle.finish().await.unwrap();
    assert!(!controller.is_up(APP_SLOT).unwrap());

    // wait_down confirms immediately once UP is clear
    assert!(controller
        .wait_down(APP_SLOT, Duration::from_millis(200), POLL)
        .await
        .unwrap());

    // Latching: the request outlives the process within this region lifetime
    assert!(controller.stop_requested(APP_SLOT).unwrap());
}

/// Scenario D: staleness is reported while UP with an old heartbeat and
/// clears immediately after a fresh ping
#[test]
fn liveness_check_reports_staleness() {
    let (_dir, path) = create_region(SLOT_COUNT, SLOT_SIZE);
    let owner = SharedRegion::open(&path, SLOT_COUNT, SLOT_SIZE).unwrap();
    let controller = Controller::open(&path, SLOT_COUNT, SLOT_SIZE).unwrap();

    let slot = owner.slot(0).unwrap();
    slot.set_ping(unix_millis().saturating_sub(60_000));
    slot.set_flag(FlagField::Up, true);

    assert!(controller.liveness(0, LIVENESS_TIMEOUT).unwrap().is_stale());
    let status = controller.status(0, LIVENESS_TIMEOUT).unwrap();
    assert!(status.up && status.stale);

    slot.set_ping(unix_millis());
    assert!(!controller.liveness(0, LIVENESS_TIMEOUT).unwrap().is_stale());
}

/// Scenario E: a backing file of the wrong size is rejected, never silently
/// truncated or grown
#[test]
fn size_mismatch_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sharedmemory");
    std::fs::write(&path, vec![0u8; 499]).unwrap();

    match SharedRegion::open(&path, SLOT_COUNT, SLOT_SIZE).unwrap_err() {
        CoreError::LayoutMismatch { expected, actual } => {
            assert_eq!(expected, 500);
            assert_eq!(actual, 499);
        }
        e => panic!("expected LayoutMismatch, got: {}", e),
    }
    // The file was not resized by the failed open
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 499);
}

/// The background heartbeat keeps PING fresh for a concurrent controller
#[tokio::test]
async fn heartbeat_keeps_controller_liveness_fresh() {
    let (_dir, path) = create_region(SLOT_COUNT, SLOT_SIZE);
    let controller = Controller::open(&path, SLOT_COUNT, SLOT_SIZE).unwrap();
    let mut handle = claim(&path, APP_SLOT);

    handle.start().unwrap();
    let first = controller.status(APP_SLOT, LIVENESS_TIMEOUT).unwrap();
    handle.mark_live().unwrap();

    tokio::time::sleep(HEARTBEAT * 5).await;
    let second = controller.status(APP_SLOT, LIVENESS_TIMEOUT).unwrap();
    assert!(second.last_ping_ms > first.last_ping_ms);
    assert!(!second.stale);

    handle.begin_stopping().unwrap();
    handle.finish().await.unwrap();
}

/// Two owners in neighboring slots never disturb each other's fields
#[tokio::test]
async fn neighboring_slots_are_independent() {
    let (_dir, path) = create_region(SLOT_COUNT, SLOT_SIZE);
    let controller = Controller::open(&path, SLOT_COUNT, SLOT_SIZE).unwrap();
    let mut app = claim(&path, 0);
    let mut worker = claim(&path, 1);

    app.start().unwrap();
    app.mark_live().unwrap();
    worker.start().unwrap();

    controller.request_stop(1).unwrap();
    assert!(!controller.stop_requested(0).unwrap());
    assert!(controller.is_operational(0).unwrap());
    assert!(!controller.is_operational(1).unwrap());

    worker.begin_stopping().unwrap();
    worker.finish().await.unwrap();
    assert!(!controller.is_up(1).unwrap());
    assert!(controller.is_up(0).unwrap());

    app.begin_stopping().unwrap();
    app.finish().await.unwrap();
}

/// A restart of the whole group recreates the region and resets the latch
#[test]
fn region_recreation_starts_a_new_generation() {
    let (_dir, path) = create_region(SLOT_COUNT, SLOT_SIZE);
    {
        let controller = Controller::open(&path, SLOT_COUNT, SLOT_SIZE).unwrap();
        controller.request_stop_app().unwrap();
        assert!(controller.stop_requested(APP_SLOT).unwrap());
    }

    // Supervisor restart: recreate, then a fresh controller sees a clean slot
    let region = SharedRegion::create(&path, SLOT_COUNT, SLOT_SIZE).unwrap();
    drop(region);
    let controller = Controller::open(&path, SLOT_COUNT, SLOT_SIZE).unwrap();
    assert!(!controller.stop_requested(APP_SLOT).unwrap());
}

//! Fixed byte layout of the shared control region
//!
//! These offsets are the wire format: every participant compiles them in, and
//! any implementation that disagrees on a single offset silently stops
//! interoperating. A slot is a contiguous `SLOT_SIZE`-byte block, one per
//! managed process; slot 0 is reserved for the top-level "app" process.
//!
//! Per-slot fields (local offsets):
//!
//! | field          | offset | size |
//! |----------------|--------|------|
//! | UP             | 0      | 1    |
//! | STOP_REQUESTED | 1      | 1    |
//! | OPERATIONAL    | 2      | 1    |
//! | PING           | 8      | 8    |
//! | reserved       | 16..   | -    |
//!
//! Reserved bytes must stay zero.

use crate::{CoreError, Result};

/// Number of slots in the default region layout
pub const SLOT_COUNT: usize = 10;

/// Bytes reserved for each slot
pub const SLOT_SIZE: usize = 50;

/// Total default region length in bytes
pub const REGION_LEN: usize = SLOT_COUNT * SLOT_SIZE;

/// Slot index reserved for the top-level supervised process
pub const APP_SLOT: usize = 0;

/// Byte value of a set flag
pub const FLAG_SET: u8 = 0xFF;

/// Byte value of a cleared flag
pub const FLAG_CLEAR: u8 = 0x00;

/// Local offset of the UP flag within a slot
pub const UP_OFFSET: usize = 0;

/// Local offset of the STOP_REQUESTED flag within a slot
pub const STOP_REQUESTED_OFFSET: usize = 1;

/// Local offset of the OPERATIONAL flag within a slot
pub const OPERATIONAL_OFFSET: usize = 2;

/// Local offset of the heartbeat timestamp within a slot
pub const PING_OFFSET: usize = 8;

/// Width of the heartbeat timestamp in bytes (little-endian u64)
pub const PING_LEN: usize = 8;

/// Smallest slot size that can hold every field
pub const MIN_SLOT_SIZE: usize = PING_OFFSET + PING_LEN;

/// Single-byte flag fields within a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagField {
    /// Process has started and is alive (written only by the slot owner)
    Up,
    /// A shutdown has been requested (written by any controller, latched)
    StopRequested,
    /// Process finished initialization and is ready to serve (owner-written)
    Operational,
}

impl FlagField {
    /// Local byte offset of this flag within its slot
    pub fn offset(self) -> usize {
        match self {
            FlagField::Up => UP_OFFSET,
            FlagField::StopRequested => STOP_REQUESTED_OFFSET,
            FlagField::Operational => OPERATIONAL_OFFSET,
        }
    }
}

/// Validate a slot geometry before mapping a region with it
pub fn validate_geometry(slot_count: usize, slot_size: usize) -> Result<()> {
    if slot_count == 0 {
        return Err(CoreError::ValidationError(
            "slot count must be greater than 0".to_string(),
        ));
    }
    if slot_size < MIN_SLOT_SIZE {
        return Err(CoreError::ValidationError(format!(
            "slot size {} is too small to hold all fields (minimum {})",
            slot_size, MIN_SLOT_SIZE
        )));
    }
    Ok(())
}

/// Absolute byte offset of the start of a slot
///
/// Total and deterministic for `index < slot_count`; fails with `OutOfRange`
/// otherwise.
pub fn slot_offset(index: usize, slot_count: usize, slot_size: usize) -> Result<usize> {
    if index >= slot_count {
        return Err(CoreError::OutOfRange {
            index,
            count: slot_count,
        });
    }
    Ok(index * slot_size)
}

/// Absolute byte offset of a flag field within the region
pub fn field_offset(
    index: usize,
    field: FlagField,
    slot_count: usize,
    slot_size: usize,
) -> Result<usize> {
    Ok(slot_offset(index, slot_count, slot_size)? + field.offset())
}

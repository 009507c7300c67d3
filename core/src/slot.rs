//! Bounded, typed access to one slot's bytes
//!
//! A [`SlotView`] is handed out by [`crate::SharedRegion::slot`] and can only
//! reach the byte range of the slot it was constructed for; the bounds are
//! fixed at construction, so no accessor can touch a neighboring slot even
//! under programmer error.

// Raw pointer access into the mapping requires unsafe code
#![allow(unsafe_code)]

use crate::layout::{FlagField, FLAG_CLEAR, FLAG_SET, MIN_SLOT_SIZE, PING_LEN, PING_OFFSET};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU8, Ordering};

/// Accessor over exactly one slot's byte range
///
/// Flag bytes are read and written as naturally aligned single-byte atomics,
/// which is the protocol's only atomicity guarantee. The 8-byte heartbeat is
/// accessed byte-wise and is therefore not atomic against a concurrent
/// reader; a single heartbeat read is advisory and staleness decisions must
/// compare successive reads over a polling interval.
#[derive(Debug)]
pub struct SlotView<'a> {
    base: *mut u8,
    slot_size: usize,
    _region: PhantomData<&'a ()>,
}

impl<'a> SlotView<'a> {
    pub(crate) fn new(base: *mut u8, slot_size: usize) -> Self {
        debug_assert!(slot_size >= MIN_SLOT_SIZE);
        Self {
            base,
            slot_size,
            _region: PhantomData,
        }
    }

    fn byte(&self, offset: usize) -> &AtomicU8 {
        debug_assert!(offset < self.slot_size);
        // Safety: `offset` lies within this slot's mapped range, which is
        // valid for the lifetime of the borrowed region, and `AtomicU8` has
        // the same layout as `u8`.
        unsafe { &*(self.base.add(offset) as *const AtomicU8) }
    }

    /// Read a flag. Any non-zero byte reads as set; a freshly zero-filled
    /// slot reads as "not up, not requested to stop, not operational".
    pub fn flag(&self, field: FlagField) -> bool {
        self.byte(field.offset()).load(Ordering::Acquire) != FLAG_CLEAR
    }

    /// Write a flag as `0xFF` (set) or `0x00` (clear)
    pub fn set_flag(&self, field: FlagField, set: bool) {
        let value = if set { FLAG_SET } else { FLAG_CLEAR };
        self.byte(field.offset()).store(value, Ordering::Release);
    }

    /// Read the heartbeat timestamp, milliseconds since the Unix epoch.
    ///
    /// Not atomic: a write racing this read can produce a torn value. Treat
    /// the result as advisory.
    pub fn ping(&self) -> u64 {
        let mut bytes = [0u8; PING_LEN];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = self.byte(PING_OFFSET + i).load(Ordering::Acquire);
        }
        u64::from_le_bytes(bytes)
    }

    /// Write the heartbeat timestamp. Only the slot's owning process may
    /// call this, and only from a single thread, so there are no write-write
    /// races on the field.
    pub fn set_ping(&self, millis: u64) {
        for (i, b) in millis.to_le_bytes().iter().enumerate() {
            self.byte(PING_OFFSET + i).store(*b, Ordering::Release);
        }
    }
}

//! Memory-mapped shared control region backing all slots
//!
//! The supervisor creates (and eventually removes) the region once per
//! process-group lifetime; every other participant opens the existing file
//! read-write for the duration of its own life. The region is never resized:
//! an existing file whose size disagrees with the expected layout is a
//! configuration inconsistency and is rejected, never silently truncated or
//! grown.

// Mapping the file requires unsafe code
#![allow(unsafe_code)]

use crate::layout;
use crate::slot::SlotView;
use crate::{CoreError, Result};
use memmap2::MmapMut;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// The mapped byte area shared by all participants
pub struct SharedRegion {
    path: PathBuf,
    slot_count: usize,
    slot_size: usize,
    mapping: Option<Mapping>,
}

struct Mapping {
    base: *mut u8,
    // Keeps the mapping alive for as long as `base` is reachable
    _map: MmapMut,
}

impl std::fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegion")
            .field("path", &self.path)
            .field("slot_count", &self.slot_count)
            .field("slot_size", &self.slot_size)
            .field("mapped", &self.mapping.is_some())
            .finish()
    }
}

// Safety: the raw base pointer is only dereferenced through `SlotView`,
// which performs single-byte atomic accesses within bounds fixed at
// construction, and it stays valid for as long as `Mapping` is held.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Create the backing file, zero-fill it to `slot_count * slot_size`
    /// bytes and map it read-write.
    ///
    /// Truncates an existing file, which is the only way a latched
    /// STOP_REQUESTED flag is ever reset: a recreated region belongs to a
    /// new process-group generation. Fails with `StorageUnavailable` if the
    /// parent directory does not exist or the file cannot be created.
    pub fn create(path: impl AsRef<Path>, slot_count: usize, slot_size: usize) -> Result<Self> {
        layout::validate_geometry(slot_count, slot_size)?;
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(CoreError::StorageUnavailable(format!(
                    "parent directory {} does not exist",
                    parent.display()
                )));
            }
        }

        let len = (slot_count * slot_size) as u64;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| {
                CoreError::StorageUnavailable(format!(
                    "failed to create region file {}: {}",
                    path.display(),
                    e
                ))
            })?;
        file.set_len(len).map_err(|e| {
            CoreError::StorageUnavailable(format!(
                "failed to size region file {} to {} bytes: {}",
                path.display(),
                len,
                e
            ))
        })?;

        let mapping = Self::map(&file, path)?;
        debug!(
            "created shared region {} ({} slots x {} bytes)",
            path.display(),
            slot_count,
            slot_size
        );
        Ok(Self {
            path: path.to_path_buf(),
            slot_count,
            slot_size,
            mapping: Some(mapping),
        })
    }

    /// Map an existing backing file read-write without altering its contents.
    ///
    /// Fails with `LayoutMismatch` if the file size does not equal
    /// `slot_count * slot_size` (protects against stale or foreign files) and
    /// with `StorageUnavailable` on missing-file or permission errors.
    pub fn open(path: impl AsRef<Path>, slot_count: usize, slot_size: usize) -> Result<Self> {
        layout::validate_geometry(slot_count, slot_size)?;
        let path = path.as_ref();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| {
                CoreError::StorageUnavailable(format!(
                    "failed to open region file {}: {}",
                    path.display(),
                    e
                ))
            })?;

        let expected = (slot_count * slot_size) as u64;
        let actual = file
            .metadata()
            .map_err(|e| {
                CoreError::StorageUnavailable(format!(
                    "failed to stat region file {}: {}",
                    path.display(),
                    e
                ))
            })?
            .len();
        if actual != expected {
            return Err(CoreError::LayoutMismatch { expected, actual });
        }

        let mapping = Self::map(&file, path)?;
        debug!(
            "opened shared region {} ({} slots x {} bytes)",
            path.display(),
            slot_count,
            slot_size
        );
        Ok(Self {
            path: path.to_path_buf(),
            slot_count,
            slot_size,
            mapping: Some(mapping),
        })
    }

    fn map(file: &fs::File, path: &Path) -> Result<Mapping> {
        // Safety: the file is held open for the duration of the mapping call
        // and all later access goes through bounded atomic reads/writes.
        let mut map = unsafe { MmapMut::map_mut(file) }.map_err(|e| {
            CoreError::StorageUnavailable(format!(
                "failed to map region file {}: {}",
                path.display(),
                e
            ))
        })?;
        let base = map.as_mut_ptr();
        Ok(Mapping { base, _map: map })
    }

    /// A bounded view over the byte range of one slot
    pub fn slot(&self, index: usize) -> Result<SlotView<'_>> {
        let mapping = self
            .mapping
            .as_ref()
            .ok_or_else(|| CoreError::StorageUnavailable("region is closed".to_string()))?;
        let offset = layout::slot_offset(index, self.slot_count, self.slot_size)?;
        // Safety: `offset + slot_size <= mapped length` by construction
        let base = unsafe { mapping.base.add(offset) };
        Ok(SlotView::new(base, self.slot_size))
    }

    /// Unmap and release the handle. Idempotent. Does not delete the backing
    /// file; deletion belongs to the supervisor via [`SharedRegion::remove`].
    pub fn close(&mut self) {
        if self.mapping.take().is_some() {
            debug!("closed shared region {}", self.path.display());
        }
    }

    /// Whether the mapping has been released
    pub fn is_closed(&self) -> bool {
        self.mapping.is_none()
    }

    /// Delete the backing file. Supervisor-only, and only once no other
    /// participant should still be observing the region. A missing file is
    /// not an error.
    pub fn remove(path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        match fs::remove_file(path) {
            Ok(()) => {
                debug!("removed shared region file {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::StorageUnavailable(format!(
                "failed to remove region file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of slots in this region
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Bytes per slot
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Total mapped length in bytes
    pub fn len(&self) -> usize {
        self.slot_count * self.slot_size
    }

    /// Always false; a region has at least one slot
    pub fn is_empty(&self) -> bool {
        false
    }
}

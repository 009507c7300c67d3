//! Small shared helpers

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, saturating to 0 for a pre-epoch clock
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Return the default region file path.
///
/// Order:
/// - `ALCOR_SHARED_FILE` env var if provided
/// - `<system temp dir>/alcor/sharedmemory` otherwise
pub fn default_region_path() -> PathBuf {
    if let Ok(p) = std::env::var("ALCOR_SHARED_FILE") {
        return PathBuf::from(p);
    }
    std::env::temp_dir().join("alcor").join("sharedmemory")
}

//! Configuration loading and validation for the shared region
//!
//! Parses a TOML settings file into typed sections, applies serde defaults
//! and performs strict validation with field-path error messages. The region
//! path itself is collaborator-provided configuration, not part of the wire
//! protocol.

use crate::layout::{self, SLOT_COUNT, SLOT_SIZE};
use crate::util::default_region_path;
use crate::{CoreError, Result};
use schemars::JsonSchema;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// `[region]` section: where the backing file lives and its geometry
#[derive(Debug, Clone, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct RegionSettings {
    /// Path of the backing file
    pub path: PathBuf,
    /// Number of slots
    pub slot_count: usize,
    /// Bytes per slot
    pub slot_size: usize,
}

impl Default for RegionSettings {
    fn default() -> Self {
        Self {
            path: default_region_path(),
            slot_count: SLOT_COUNT,
            slot_size: SLOT_SIZE,
        }
    }
}

/// `[timing]` section: heartbeat, poll and liveness periods in milliseconds
#[derive(Debug, Clone, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingSettings {
    /// Heartbeat refresh period for a live process
    pub heartbeat_ms: u64,
    /// Poll period for stop requests and down-waits
    pub poll_ms: u64,
    /// Heartbeat age beyond which a controller reports a slot stale
    pub liveness_timeout_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            heartbeat_ms: 500,
            poll_ms: 200,
            liveness_timeout_ms: 10_000,
        }
    }
}

impl TimingSettings {
    /// Heartbeat refresh period
    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }

    /// Stop-request poll period
    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    /// Staleness threshold
    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }
}

/// Top-level TOML structure for protocol settings
#[derive(Debug, Clone, Default, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SettingsFile {
    /// Region location and geometry
    #[serde(default)]
    pub region: RegionSettings,
    /// Heartbeat and polling periods
    #[serde(default)]
    pub timing: TimingSettings,
}

impl SettingsFile {
    /// Validate the settings.
    ///
    /// The heartbeat period must be materially shorter than the liveness
    /// timeout, otherwise a healthy process can be reported stale between
    /// two refreshes; "materially" is enforced as at most half.
    pub fn validate(&self) -> Result<()> {
        layout::validate_geometry(self.region.slot_count, self.region.slot_size)?;
        if self.region.path.as_os_str().is_empty() {
            return Err(CoreError::ValidationError(
                "region.path cannot be empty".to_string(),
            ));
        }
        if self.timing.heartbeat_ms == 0 {
            return Err(CoreError::ValidationError(
                "timing.heartbeatMs must be greater than 0".to_string(),
            ));
        }
        if self.timing.poll_ms == 0 {
            return Err(CoreError::ValidationError(
                "timing.pollMs must be greater than 0".to_string(),
            ));
        }
        if self.timing.heartbeat_ms.saturating_mul(2) > self.timing.liveness_timeout_ms {
            return Err(CoreError::ValidationError(format!(
                "timing.heartbeatMs ({}) must be at most half of timing.livenessTimeoutMs ({})",
                self.timing.heartbeat_ms, self.timing.liveness_timeout_ms
            )));
        }
        Ok(())
    }
}

/// Load and validate settings from a TOML string
pub fn load_settings_from_toml_str(data: &str) -> Result<SettingsFile> {
    let settings: SettingsFile = toml::from_str(data)
        .map_err(|e| CoreError::ConfigurationError(format!("Failed to parse settings: {}", e)))?;
    settings.validate()?;
    Ok(settings)
}

/// Load and validate settings from a TOML file path
pub fn load_settings_from_toml_path(path: impl AsRef<Path>) -> Result<SettingsFile> {
    let data = fs::read_to_string(&path).map_err(|e| {
        CoreError::ConfigurationError(format!(
            "Failed to read settings {:?}: {}",
            path.as_ref(),
            e
        ))
    })?;
    load_settings_from_toml_str(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let settings = SettingsFile::default();
        settings.validate().expect("defaults must validate");
        assert_eq!(settings.region.slot_count, SLOT_COUNT);
        assert_eq!(settings.region.slot_size, SLOT_SIZE);
        assert_eq!(settings.timing.heartbeat(), Duration::from_millis(500));
    }

    #[test]
    fn test_parse_full_settings() {
        let settings = load_settings_from_toml_str(
            r#"
            [region]
            path = "/run/alcor/sharedmemory"
            slotCount = 4
            slotSize = 32

            [timing]
            heartbeatMs = 250
            pollMs = 100
            livenessTimeoutMs = 5000
            "#,
        )
        .expect("parse ok");
        assert_eq!(settings.region.path, PathBuf::from("/run/alcor/sharedmemory"));
        assert_eq!(settings.region.slot_count, 4);
        assert_eq!(settings.region.slot_size, 32);
        assert_eq!(settings.timing.liveness_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let settings = load_settings_from_toml_str(
            r#"
            [timing]
            heartbeatMs = 100
            "#,
        )
        .expect("parse ok");
        assert_eq!(settings.region.slot_count, SLOT_COUNT);
        assert_eq!(settings.timing.heartbeat_ms, 100);
        assert_eq!(settings.timing.poll_ms, 200);
    }

    #[test]
    fn test_heartbeat_must_be_materially_shorter_than_timeout() {
        let err = load_settings_from_toml_str(
            r#"
            [timing]
            heartbeatMs = 6000
            livenessTimeoutMs = 10000
            "#,
        )
        .unwrap_err();
        let msg = format!("{}", err);
        assert!(msg.contains("at most half"), "unexpected message: {}", msg);
    }

    #[test]
    fn test_geometry_is_validated() {
        let err = load_settings_from_toml_str(
            r#"
            [region]
            slotSize = 8
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }

    #[test]
    fn test_malformed_toml_is_a_configuration_error() {
        let err = load_settings_from_toml_str("[region").unwrap_err();
        assert!(matches!(err, CoreError::ConfigurationError(_)));
    }
}

//! Core error types and utilities

use thiserror::Error;

/// Core-specific error types
///
/// `Stale` is deliberately absent: a stale heartbeat is a liveness verdict
/// reported through [`crate::Liveness`], never a failure of the protocol.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Initialization error: {0}")]
    InitializationError(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Layout mismatch: expected {expected} bytes, found {actual}")]
    LayoutMismatch { expected: u64, actual: u64 },

    #[error("Slot index {index} out of range (slot count {count})")]
    OutOfRange { index: usize, count: usize },

    #[error("Invalid lifecycle transition: {0}")]
    InvalidTransition(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CoreError {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::ConfigurationError(_) => "ALC001",
            CoreError::ValidationError(_) => "ALC002",
            CoreError::InitializationError(_) => "ALC003",
            CoreError::StorageUnavailable(_) => "ALC004",
            CoreError::LayoutMismatch { .. } => "ALC005",
            CoreError::OutOfRange { .. } => "ALC006",
            CoreError::InvalidTransition(_) => "ALC007",
            CoreError::IoError(_) => "ALC008",
        }
    }
}

/// Core-specific result type
pub type Result<T> = std::result::Result<T, CoreError>;

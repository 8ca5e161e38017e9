//! Lock acquisition errors

use crate::mode::LockModeKind;
use std::time::Duration;
use thiserror::Error;

/// Result type for lock operations
pub type LockResult<T> = std::result::Result<T, LockError>;

/// Lock acquisition errors
///
/// Both variants are returned straight to the caller; nothing is retried or
/// logged on their behalf.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// Too many grants are outstanding on the key. Raised before any waiting.
    #[error("Lock capacity exceeded: key '{key}' already has {limit} outstanding grants")]
    CapacityExceeded { key: String, limit: usize },

    /// The grants ahead of this request did not drain in time. The request's
    /// own grant has already been torn down.
    #[error(
        "Lock timeout: {mode} lock on key '{key}' not granted within {}ms",
        timeout.as_millis()
    )]
    AcquisitionTimeout {
        key: String,
        mode: LockModeKind,
        timeout: Duration,
    },
}

impl LockError {
    /// Get error code for this lock error
    pub fn code(&self) -> &'static str {
        match self {
            Self::CapacityExceeded { .. } => "E_CAPACITY",
            Self::AcquisitionTimeout { .. } => "E_TIMEOUT",
        }
    }

    /// The wait for earlier grants ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::AcquisitionTimeout { .. })
    }

    /// The key was full; nothing was admitted.
    pub fn is_capacity(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. })
    }

    /// Key the failed request was made against.
    pub fn key(&self) -> &str {
        match self {
            Self::CapacityExceeded { key, .. } | Self::AcquisitionTimeout { key, .. } => key,
        }
    }
}

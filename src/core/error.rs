//! Error taxonomy shared by the engine and the native boundary.

use std::collections::TryReserveError;

use thiserror::Error;

use crate::spatial::EngineStatus;

/// Result type for spatial hash operations
pub type SpatialResult<T> = Result<T, SpatialError>;

/// Every failure is reported at the point of the call; nothing is retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpatialError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("index {index} out of range ({len} live entries)")]
    OutOfRange { index: usize, len: usize },

    #[error("`{operation}` is not allowed while the engine is {status}")]
    InvalidState {
        operation: &'static str,
        status: EngineStatus,
    },

    #[error("allocation failure: {0}")]
    AllocationFailure(String),
}

impl SpatialError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        SpatialError::InvalidArgument(msg.into())
    }

    /// Stable status code used across the C ABI. `0` is reserved for success.
    pub fn status_code(&self) -> u32 {
        match self {
            SpatialError::InvalidArgument(_) => 1,
            SpatialError::OutOfRange { .. } => 2,
            SpatialError::InvalidState { .. } => 3,
            SpatialError::AllocationFailure(_) => 4,
        }
    }
}

impl From<TryReserveError> for SpatialError {
    fn from(err: TryReserveError) -> Self {
        SpatialError::AllocationFailure(err.to_string())
    }
}

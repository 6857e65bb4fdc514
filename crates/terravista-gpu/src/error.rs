//! GPU error types.

use thiserror::Error;

/// GPU-related errors.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Memory allocation failed.
    #[error("Memory allocation failed: {0}")]
    AllocationFailed(String),

    /// A resource was created with no contents.
    #[error("Empty resource: {0}")]
    EmptyResource(String),

    /// Frame submission failed.
    #[error("Submission failed: {0}")]
    SubmitFailed(String),

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl From<GpuError> for terravista_core::Error {
    fn from(err: GpuError) -> Self {
        Self::Gpu(err.to_string())
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;

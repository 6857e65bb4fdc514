//! Model loading errors.

use terravista_gpu::GpuError;
use thiserror::Error;

/// Why a model could not be loaded.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    /// The resolver has no model under this name.
    #[error("model not found: {0}")]
    NotFound(String),

    /// The model data is unusable.
    #[error("malformed model {name}: {reason}")]
    Malformed { name: String, reason: String },

    /// The resolver panicked.
    #[error("model resolver panicked while loading {0}")]
    Panicked(String),

    /// GPU upload failed.
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// Result type alias for model loading.
pub type Result<T> = std::result::Result<T, ModelLoadError>;

//! Pipeline error types.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A raw artifact could not be turned into a raster
    #[error("Decode failed for {path}: {message}")]
    Decode { path: String, message: String },

    #[error("Transform failed: {0}")]
    Transform(#[from] projection::ProjectionError),

    #[error("Render failed: {0}")]
    Render(#[from] renderer::RenderError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Invalid stream settings: {0}")]
    Settings(String),

    #[error(transparent)]
    Common(#[from] loop_common::LoopError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn decode(path: &std::path::Path, message: impl std::fmt::Display) -> Self {
        PipelineError::Decode {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }

    /// Errors confined to a single artifact; the rest of the cycle continues.
    pub fn is_per_artifact(&self) -> bool {
        matches!(
            self,
            PipelineError::Decode { .. } | PipelineError::Transform(_) | PipelineError::Render(_)
        )
    }
}

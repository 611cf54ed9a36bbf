use thiserror::Error;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Invalid raster: {0}")]
    InvalidRaster(String),

    #[error("Failed to load font {0}")]
    Font(String),

    #[error("Failed to load overlay {path}: {message}")]
    Overlay { path: String, message: String },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Unsupported animation format: {0}")]
    UnsupportedFormat(String),

    #[error("Encoder failed: {0}")]
    Encoder(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

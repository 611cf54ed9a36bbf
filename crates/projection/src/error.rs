use thiserror::Error;

pub type ProjectionResult<T> = Result<T, ProjectionError>;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Invalid source geometry: {0}")]
    InvalidGeometry(String),

    #[error("Source data has {actual} values, transform expects {expected}")]
    SourceSizeMismatch { expected: usize, actual: usize },

    #[error("No target cell maps to the source within {radius_m} m")]
    NoOverlap { radius_m: f64 },
}

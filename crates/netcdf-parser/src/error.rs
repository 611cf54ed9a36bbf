//! Error types for NetCDF parsing operations.

use thiserror::Error;

/// Result type for NetCDF parser operations.
pub type NetCdfResult<T> = Result<T, NetCdfError>;

/// Error types for NetCDF parsing.
#[derive(Error, Debug)]
pub enum NetCdfError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Missing required variable, dimension or attribute
    #[error("Missing required data: {0}")]
    MissingData(String),

    /// Present but not parseable or inconsistent
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    /// ncdump could not be run or exited non-zero
    #[error("Command execution failed: {0}")]
    CommandError(String),

    /// The decoded grid does not describe a usable source geometry
    #[error("Invalid geometry: {0}")]
    Geometry(#[from] projection::ProjectionError),
}

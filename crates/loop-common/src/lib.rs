//! Common types shared across the sky-looper crates and services.

pub mod bbox;
pub mod error;
pub mod grid;
pub mod time;

pub use bbox::BoundingBox;
pub use error::{LoopError, LoopResult};
pub use grid::TargetGrid;
pub use time::{
    age, duration_from_hours, epoch_of, file_age, FileAge, GeometryEpoch, TimeParseError,
    TimestampFormat,
};

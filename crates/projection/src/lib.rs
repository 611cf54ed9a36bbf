//! Source sensor geometries and the nearest-neighbour transform onto a
//! fixed target grid.
//!
//! Implements the geostationary and radar-sweep geometries from scratch;
//! the only heavy lifting is [`build_transform`], which is meant to be run
//! rarely and cached by the caller.

pub mod error;
pub mod geodesy;
pub mod geostationary;
pub mod polar;
pub mod transform;

pub use error::{ProjectionError, ProjectionResult};
pub use geostationary::Geostationary;
pub use polar::PolarSweep;
pub use transform::{apply_transform, build_transform, SourceGeometry, TransformCoefficients};

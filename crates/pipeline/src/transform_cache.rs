//! Per-stream cache of the source-to-target transform.
//!
//! Building a transform is expensive; source geometry is stable for a day at
//! a time, so coefficients are reused until the UTC day changes, the source
//! geometry changes, or a failure invalidates them.

use std::sync::Arc;

use loop_common::{GeometryEpoch, TargetGrid};
use metrics::counter;
use projection::{build_transform, SourceGeometry, TransformCoefficients};
use tracing::info;

use crate::error::PipelineResult;

/// Default search radius for nearest-neighbour matching.
pub const DEFAULT_SEARCH_RADIUS_M: f64 = 5000.0;

struct CachedTransform {
    coefficients: Arc<TransformCoefficients>,
    geometry: SourceGeometry,
    epoch: GeometryEpoch,
}

pub struct TransformCache {
    search_radius_m: f64,
    cached: Option<CachedTransform>,
    builds: u64,
}

/// True when coefficients built for `previous` must not be used for `current`.
pub fn needs_rebuild(previous: Option<GeometryEpoch>, current: GeometryEpoch) -> bool {
    previous != Some(current)
}

impl TransformCache {
    pub fn new(search_radius_m: f64) -> Self {
        Self {
            search_radius_m,
            cached: None,
            builds: 0,
        }
    }

    /// Coefficients mapping `geometry` onto `grid` for an artifact of `epoch`,
    /// rebuilt only when necessary. Returns the epoch they were built for.
    pub fn get_transform(
        &mut self,
        geometry: &SourceGeometry,
        grid: &TargetGrid,
        epoch: GeometryEpoch,
    ) -> PipelineResult<(Arc<TransformCoefficients>, GeometryEpoch)> {
        if let Some(cached) = &self.cached {
            let reusable = !needs_rebuild(Some(cached.epoch), epoch)
                && cached.geometry.compatible_with(geometry)
                && cached.coefficients.dimensions() == grid.dimensions();
            if reusable {
                return Ok((Arc::clone(&cached.coefficients), cached.epoch));
            }
        }

        let previous = self.cached.as_ref().map(|c| c.epoch);
        // drop stale coefficients before building so two never coexist
        self.cached = None;
        let coefficients = Arc::new(build_transform(geometry, grid, self.search_radius_m)?);
        self.builds += 1;
        counter!("sky_looper_transform_builds_total").increment(1);
        info!(
            source = geometry.kind(),
            epoch = %epoch,
            previous_epoch = ?previous,
            valid_cells = coefficients.valid_count(),
            "Rebuilt transform coefficients"
        );

        self.cached = Some(CachedTransform {
            coefficients: Arc::clone(&coefficients),
            geometry: geometry.clone(),
            epoch,
        });
        Ok((coefficients, epoch))
    }

    /// Forget the cached coefficients; the next request rebuilds.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    pub fn is_warm(&self) -> bool {
        self.cached.is_some()
    }

    pub fn cached_epoch(&self) -> Option<GeometryEpoch> {
        self.cached.as_ref().map(|c| c.epoch)
    }

    /// Number of builds since creation.
    pub fn builds(&self) -> u64 {
        self.builds
    }

    pub fn search_radius_m(&self) -> f64 {
        self.search_radius_m
    }
}

impl Default for TransformCache {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_RADIUS_M)
    }
}

impl std::fmt::Debug for TransformCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformCache")
            .field("search_radius_m", &self.search_radius_m)
            .field("epoch", &self.cached_epoch())
            .field("builds", &self.builds)
            .finish()
    }
}

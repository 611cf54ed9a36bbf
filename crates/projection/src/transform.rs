//! Nearest-neighbour transform from a source sensor grid onto a [`TargetGrid`].
//!
//! Building a transform touches every target cell with the full projection
//! math and is by far the most expensive step in a render. Applying one is a
//! plain gather over the source array.
//!
//! # Memory Usage
//!
//! Per target cell: 4 bytes source index + 4 bytes distance + 1 validity bit.
//! A 200-mile grid at 0.005 deg is ~1.7M cells, so ~14MB per transform.

use loop_common::TargetGrid;
use rayon::prelude::*;
use tracing::debug;

use crate::error::{ProjectionError, ProjectionResult};
use crate::geodesy::haversine_m;
use crate::geostationary::Geostationary;
use crate::polar::PolarSweep;

/// Native geometry of one source artifact.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceGeometry {
    Geostationary(Geostationary),
    PolarSweep(PolarSweep),
}

impl SourceGeometry {
    pub fn validate(&self) -> ProjectionResult<()> {
        match self {
            SourceGeometry::Geostationary(g) => g.validate(),
            SourceGeometry::PolarSweep(p) => p.validate(),
        }
    }

    /// Number of values a source array of this geometry holds.
    pub fn source_len(&self) -> usize {
        match self {
            SourceGeometry::Geostationary(g) => g.len(),
            SourceGeometry::PolarSweep(p) => p.len(),
        }
    }

    /// True when a transform built for `self` can be applied to data of `other`.
    pub fn compatible_with(&self, other: &SourceGeometry) -> bool {
        match (self, other) {
            (SourceGeometry::Geostationary(a), SourceGeometry::Geostationary(b)) => a == b,
            (SourceGeometry::PolarSweep(a), SourceGeometry::PolarSweep(b)) => a.same_layout(b),
            _ => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SourceGeometry::Geostationary(_) => "geostationary",
            SourceGeometry::PolarSweep(_) => "polar_sweep",
        }
    }
}

/// Precomputed target-cell to source-cell mapping.
#[derive(Debug, Clone)]
pub struct TransformCoefficients {
    target_width: usize,
    target_height: usize,
    source_len: usize,
    /// Source index for each target cell, row-major from the north-west corner.
    index: Vec<u32>,
    /// Distance (meters) between the target cell center and its source cell.
    distance: Vec<f32>,
    /// Bit N is set when target cell N has a source neighbour within radius.
    valid_bitmap: Vec<u64>,
}

impl TransformCoefficients {
    fn empty(target_width: usize, target_height: usize, source_len: usize) -> Self {
        let cells = target_width * target_height;
        Self {
            target_width,
            target_height,
            source_len,
            index: vec![0; cells],
            distance: vec![f32::NAN; cells],
            valid_bitmap: vec![0u64; cells.div_ceil(64)],
        }
    }

    #[inline]
    fn set(&mut self, cell: usize, source: u32, distance: f32) {
        self.index[cell] = source;
        self.distance[cell] = distance;
        self.valid_bitmap[cell / 64] |= 1u64 << (cell % 64);
    }

    #[inline]
    pub fn is_valid(&self, cell: usize) -> bool {
        (self.valid_bitmap[cell / 64] & (1u64 << (cell % 64))) != 0
    }

    pub fn source_index(&self, cell: usize) -> Option<usize> {
        self.is_valid(cell).then(|| self.index[cell] as usize)
    }

    pub fn distance_m(&self, cell: usize) -> Option<f32> {
        self.is_valid(cell).then(|| self.distance[cell])
    }

    pub fn valid_count(&self) -> usize {
        self.valid_bitmap
            .iter()
            .map(|w| w.count_ones() as usize)
            .sum()
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.target_width, self.target_height)
    }

    pub fn cell_count(&self) -> usize {
        self.target_width * self.target_height
    }

    pub fn source_len(&self) -> usize {
        self.source_len
    }
}

/// Map every target cell to the nearest source cell within `radius_m`.
pub fn build_transform(
    source: &SourceGeometry,
    target: &TargetGrid,
    radius_m: f64,
) -> ProjectionResult<TransformCoefficients> {
    source.validate()?;
    let (width, height) = target.dimensions();

    let rows: Vec<Vec<Option<(u32, f32)>>> = match source {
        SourceGeometry::Geostationary(geo) => (0..height)
            .into_par_iter()
            .map(|row| {
                (0..width)
                    .map(|col| {
                        let (lon, lat) = target.cell_center(col, row);
                        let idx = geo.nearest_index(lon, lat)?;
                        let (slon, slat) = geo.index_to_geo(idx)?;
                        let d = haversine_m(lon, lat, slon, slat);
                        (d <= radius_m).then_some((idx as u32, d as f32))
                    })
                    .collect()
            })
            .collect(),
        SourceGeometry::PolarSweep(sweep) => {
            let locator = sweep.locator();
            (0..height)
                .into_par_iter()
                .map(|row| {
                    (0..width)
                        .map(|col| {
                            let (lon, lat) = target.cell_center(col, row);
                            let (idx, d) = locator.nearest(lon, lat)?;
                            (d <= radius_m).then_some((idx as u32, d as f32))
                        })
                        .collect()
                })
                .collect()
        }
    };

    let mut coeffs = TransformCoefficients::empty(width, height, source.source_len());
    for (row, cells) in rows.into_iter().enumerate() {
        for (col, hit) in cells.into_iter().enumerate() {
            if let Some((idx, d)) = hit {
                coeffs.set(row * width + col, idx, d);
            }
        }
    }

    let valid = coeffs.valid_count();
    if valid == 0 {
        return Err(ProjectionError::NoOverlap { radius_m });
    }

    debug!(
        source = source.kind(),
        width,
        height,
        valid,
        "Built nearest-neighbour transform"
    );
    Ok(coeffs)
}

/// Gather source values onto the target grid. Unmapped cells are NaN.
pub fn apply_transform(
    coeffs: &TransformCoefficients,
    source: &[f32],
) -> ProjectionResult<Vec<f32>> {
    if source.len() != coeffs.source_len {
        return Err(ProjectionError::SourceSizeMismatch {
            expected: coeffs.source_len,
            actual: source.len(),
        });
    }

    Ok((0..coeffs.cell_count())
        .map(|cell| match coeffs.source_index(cell) {
            Some(idx) => source[idx],
            None => f32::NAN,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodesy::destination;

    fn site_grid() -> TargetGrid {
        TargetGrid::new(-111.4223, 34.7443, 0.5, 0.5, 0.05).unwrap()
    }

    fn small_sweep() -> PolarSweep {
        PolarSweep {
            site_lon: -111.4223,
            site_lat: 34.7443,
            azimuths: (0..360).map(|a| a as f32).collect(),
            first_gate_m: 500.0,
            gate_spacing_m: 1000.0,
            gate_count: 60,
        }
    }

    #[test]
    fn test_geostationary_transform_covers_site() {
        let geo = SourceGeometry::Geostationary(Geostationary::goes16_conus_2km());
        let grid = site_grid();
        let coeffs = build_transform(&geo, &grid, 5000.0).unwrap();

        assert_eq!(coeffs.dimensions(), grid.dimensions());
        assert_eq!(coeffs.valid_count(), grid.cell_count());
        for cell in 0..coeffs.cell_count() {
            assert!(coeffs.distance_m(cell).unwrap() <= 5000.0);
        }
    }

    #[test]
    fn test_polar_transform_masks_outside_range() {
        let sweep = small_sweep();
        let geometry = SourceGeometry::PolarSweep(sweep.clone());
        let grid = site_grid();
        let coeffs = build_transform(&geometry, &grid, 5000.0).unwrap();

        assert!(coeffs.valid_count() > 0);
        assert!(coeffs.valid_count() < grid.cell_count(), "corners are beyond 60 km");

        // a target near the site maps into the first few gates
        let (x, y) = grid.geo_to_pixel(-111.4223, 34.7443);
        let cell = y as usize * grid.width() + x as usize;
        let idx = coeffs.source_index(cell).unwrap();
        assert!(idx % sweep.gate_count < 5);
    }

    #[test]
    fn test_apply_gathers_values() {
        let sweep = small_sweep();
        let geometry = SourceGeometry::PolarSweep(sweep.clone());
        let grid = site_grid();
        let coeffs = build_transform(&geometry, &grid, 5000.0).unwrap();

        // value encodes the gate number
        let data: Vec<f32> = (0..sweep.len())
            .map(|i| (i % sweep.gate_count) as f32)
            .collect();
        let out = apply_transform(&coeffs, &data).unwrap();
        assert_eq!(out.len(), grid.cell_count());

        for cell in 0..coeffs.cell_count() {
            if let Some(idx) = coeffs.source_index(cell) {
                assert_eq!(out[cell], data[idx]);
            }
        }

        // due north of the site, ~20 km out
        let (lon, lat) = destination(sweep.site_lon, sweep.site_lat, 0.0, 20_500.0);
        let (x, y) = grid.geo_to_pixel(lon, lat);
        let v = out[y as usize * grid.width() + x as usize];
        assert!((v - 20.0).abs() <= 6.0, "expected roughly gate 20, got {}", v);

        let nan_cells = out.iter().filter(|v| v.is_nan()).count();
        assert_eq!(nan_cells, grid.cell_count() - coeffs.valid_count());
    }

    #[test]
    fn test_apply_rejects_wrong_source_size() {
        let geometry = SourceGeometry::PolarSweep(small_sweep());
        let coeffs = build_transform(&geometry, &site_grid(), 5000.0).unwrap();
        let err = apply_transform(&coeffs, &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, ProjectionError::SourceSizeMismatch { .. }));
    }

    #[test]
    fn test_no_overlap_is_an_error() {
        let mut sweep = small_sweep();
        sweep.site_lon = 10.0;
        let result = build_transform(&SourceGeometry::PolarSweep(sweep), &site_grid(), 5000.0);
        assert!(matches!(result, Err(ProjectionError::NoOverlap { .. })));
    }

    #[test]
    fn test_compatibility_rules() {
        let a = SourceGeometry::PolarSweep(small_sweep());
        let mut jittered = small_sweep();
        jittered.azimuths[3] += 0.2;
        assert!(a.compatible_with(&SourceGeometry::PolarSweep(jittered)));

        let g = SourceGeometry::Geostationary(Geostationary::goes16_conus_2km());
        assert!(!a.compatible_with(&g));
        assert!(g.compatible_with(&g.clone()));
    }
}

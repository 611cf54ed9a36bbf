//! Synthetic rasters with predictable values.

use loop_common::TargetGrid;
use projection::{Geostationary, PolarSweep, SourceGeometry};

/// Dark Cosmic Telescope site, the default map center.
pub const SITE_LON: f64 = -111.4223;
pub const SITE_LAT: f64 = 34.7443;

/// A coarse grid around the site, cheap enough to build transforms for in tests.
pub fn site_grid(half_width_deg: f64, resolution: f64) -> TargetGrid {
    TargetGrid::new(SITE_LON, SITE_LAT, half_width_deg, half_width_deg, resolution)
        .expect("Invalid test grid")
}

/// A full-circle sweep centered on the site, one ray per `360 / rays` degrees.
pub fn polar_sweep(rays: usize, gates: usize, gate_spacing_m: f64) -> PolarSweep {
    PolarSweep {
        site_lon: SITE_LON,
        site_lat: SITE_LAT,
        azimuths: (0..rays).map(|r| (r as f64 * 360.0 / rays as f64) as f32).collect(),
        first_gate_m: gate_spacing_m / 2.0,
        gate_spacing_m,
        gate_count: gates,
    }
}

/// Reflectivity in concentric rings: `-30 + 5 * (gate % 20)` dBZ.
pub fn reflectivity_rings(sweep: &PolarSweep) -> Vec<f32> {
    (0..sweep.ray_count())
        .flat_map(|_| (0..sweep.gate_count).map(|g| -30.0 + 5.0 * (g % 20) as f32))
        .collect()
}

/// Brightness temperatures on the GOES-16 CONUS fixed grid, cooling from
/// 300 K in the south to 200 K in the north.
pub fn goes_brightness_ramp(geo: &Geostationary) -> Vec<f32> {
    let (nx, ny) = geo.dimensions();
    (0..ny)
        .flat_map(|row| {
            let t = 200.0 + 100.0 * row as f32 / ny.max(1) as f32;
            std::iter::repeat(t).take(nx)
        })
        .collect()
}

/// A polar geometry and matching values, ready for a stub decoder.
pub fn synthetic_radar() -> (SourceGeometry, Vec<f32>) {
    let sweep = polar_sweep(360, 100, 1000.0);
    let values = reflectivity_rings(&sweep);
    (SourceGeometry::PolarSweep(sweep), values)
}

/// The GOES-16 CONUS geometry and a brightness ramp.
pub fn synthetic_goes() -> (SourceGeometry, Vec<f32>) {
    let geo = Geostationary::goes16_conus_2km();
    let values = goes_brightness_ramp(&geo);
    (SourceGeometry::Geostationary(geo), values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_rasters_match_geometry() {
        let (geometry, values) = synthetic_radar();
        assert_eq!(values.len(), geometry.source_len());
        assert_eq!(values[0], -30.0);
        assert_eq!(values[19], 65.0);
        assert_eq!(values[20], -30.0);

        let (geometry, values) = synthetic_goes();
        assert_eq!(values.len(), geometry.source_len());
    }

    #[test]
    fn test_site_grid_dimensions() {
        let grid = site_grid(0.5, 0.25);
        assert_eq!(grid.dimensions(), (4, 4));
    }
}

//! Geometry of a single radar sweep (rays of equally spaced range gates).
//!
//! Data for a sweep is laid out ray-major: value `ray * gate_count + gate`.
//! Beam height is ignored; gates are placed on the sphere at their slant
//! range, which is close enough for low-elevation sweeps at map scale.

use crate::error::{ProjectionError, ProjectionResult};
use crate::geodesy::{bearing_deg, haversine_m};

#[derive(Debug, Clone, PartialEq)]
pub struct PolarSweep {
    pub site_lon: f64,
    pub site_lat: f64,
    /// Azimuth of each ray, degrees clockwise from north.
    pub azimuths: Vec<f32>,
    /// Range to the center of the first gate (meters).
    pub first_gate_m: f64,
    pub gate_spacing_m: f64,
    pub gate_count: usize,
}

impl PolarSweep {
    pub fn validate(&self) -> ProjectionResult<()> {
        if self.azimuths.is_empty() || self.gate_count == 0 {
            return Err(ProjectionError::InvalidGeometry(format!(
                "empty sweep: {} rays x {} gates",
                self.azimuths.len(),
                self.gate_count
            )));
        }
        if !(self.gate_spacing_m > 0.0) {
            return Err(ProjectionError::InvalidGeometry(format!(
                "gate spacing must be positive, got {}",
                self.gate_spacing_m
            )));
        }
        if self.azimuths.iter().any(|a| !a.is_finite()) {
            return Err(ProjectionError::InvalidGeometry(
                "non-finite ray azimuth".to_string(),
            ));
        }
        Ok(())
    }

    pub fn ray_count(&self) -> usize {
        self.azimuths.len()
    }

    pub fn len(&self) -> usize {
        self.ray_count() * self.gate_count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum range covered by the sweep (meters).
    pub fn max_range_m(&self) -> f64 {
        self.first_gate_m + (self.gate_count as f64 - 0.5) * self.gate_spacing_m
    }

    /// Same site, gate layout and ray order. Each ray may differ from its
    /// counterpart by less than half a ray spacing; a sweep that starts at a
    /// different azimuth is a different layout, since transform indices are
    /// ray-major.
    pub fn same_layout(&self, other: &PolarSweep) -> bool {
        if self.site_lon != other.site_lon
            || self.site_lat != other.site_lat
            || self.first_gate_m != other.first_gate_m
            || self.gate_spacing_m != other.gate_spacing_m
            || self.gate_count != other.gate_count
            || self.ray_count() != other.ray_count()
        {
            return false;
        }
        let tolerance = 0.5 * 360.0 / self.ray_count().max(1) as f64;
        self.azimuths.iter().zip(&other.azimuths).all(|(&a, &b)| {
            let d = (a as f64 - b as f64).rem_euclid(360.0);
            d.min(360.0 - d) < tolerance
        })
    }

    pub fn locator(&self) -> SweepLocator<'_> {
        let mut by_azimuth: Vec<(f64, usize)> = self
            .azimuths
            .iter()
            .enumerate()
            .map(|(ray, &az)| ((az as f64).rem_euclid(360.0), ray))
            .collect();
        by_azimuth.sort_by(|a, b| a.0.total_cmp(&b.0));
        SweepLocator {
            sweep: self,
            by_azimuth,
        }
    }
}

/// Azimuth-sorted view of a sweep for repeated nearest-gate lookups.
pub struct SweepLocator<'a> {
    sweep: &'a PolarSweep,
    by_azimuth: Vec<(f64, usize)>,
}

impl SweepLocator<'_> {
    /// Nearest gate to a geographic point as (flat index, distance in meters).
    pub fn nearest(&self, lon: f64, lat: f64) -> Option<(usize, f64)> {
        let sweep = self.sweep;
        let range = haversine_m(sweep.site_lon, sweep.site_lat, lon, lat);
        let gate_f = ((range - sweep.first_gate_m) / sweep.gate_spacing_m).round();
        if gate_f < 0.0 || gate_f >= sweep.gate_count as f64 {
            return None;
        }
        let gate = gate_f as usize;

        let azimuth = bearing_deg(sweep.site_lon, sweep.site_lat, lon, lat);
        let (ray_az, ray) = self.nearest_ray(azimuth)?;

        let gate_range = sweep.first_gate_m + gate as f64 * sweep.gate_spacing_m;
        let dtheta = (azimuth - ray_az).to_radians();
        let dist_sq = range * range + gate_range * gate_range - 2.0 * range * gate_range * dtheta.cos();

        Some((ray * sweep.gate_count + gate, dist_sq.max(0.0).sqrt()))
    }

    fn nearest_ray(&self, azimuth: f64) -> Option<(f64, usize)> {
        let n = self.by_azimuth.len();
        if n == 0 {
            return None;
        }
        let pos = self.by_azimuth.partition_point(|&(az, _)| az < azimuth);
        let after = self.by_azimuth[pos % n];
        let before = self.by_azimuth[(pos + n - 1) % n];

        let gap = |az: f64| {
            let d = (azimuth - az).rem_euclid(360.0);
            d.min(360.0 - d)
        };
        if gap(before.0) <= gap(after.0) {
            Some(before)
        } else {
            Some(after)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodesy::destination;

    fn sweep() -> PolarSweep {
        PolarSweep {
            site_lon: -111.1983,
            site_lat: 34.5744,
            azimuths: (0..360).map(|a| a as f32 + 0.5).collect(),
            first_gate_m: 2125.0,
            gate_spacing_m: 250.0,
            gate_count: 1832,
        }
    }

    #[test]
    fn test_nearest_gate_along_known_bearing() {
        let s = sweep();
        let locator = s.locator();

        let (lon, lat) = destination(s.site_lon, s.site_lat, 90.5, 2125.0 + 100.0 * 250.0);
        let (index, dist) = locator.nearest(lon, lat).unwrap();
        assert_eq!(index, 90 * s.gate_count + 100);
        assert!(dist < 5.0, "distance {}", dist);
    }

    #[test]
    fn test_wraparound_at_north() {
        let s = sweep();
        let locator = s.locator();

        // 359.9 deg is closer to the 359.5 ray than to the 0.5 ray
        let (lon, lat) = destination(s.site_lon, s.site_lat, 359.9, 50_000.0);
        let (index, _) = locator.nearest(lon, lat).unwrap();
        assert_eq!(index / s.gate_count, 359);

        let (lon, lat) = destination(s.site_lon, s.site_lat, 0.2, 50_000.0);
        let (index, _) = locator.nearest(lon, lat).unwrap();
        assert_eq!(index / s.gate_count, 0);
    }

    #[test]
    fn test_out_of_range_returns_none() {
        let s = sweep();
        let locator = s.locator();
        let (lon, lat) = destination(s.site_lon, s.site_lat, 45.0, s.max_range_m() + 10_000.0);
        assert!(locator.nearest(lon, lat).is_none());
        // inside the first gate
        assert!(locator.nearest(s.site_lon, s.site_lat).is_none());
    }

    #[test]
    fn test_same_layout_ignores_azimuth_jitter() {
        let a = sweep();
        let mut b = sweep();
        b.azimuths[10] += 0.3;
        b.azimuths[0] = 0.1;
        assert!(a.same_layout(&b));
        b.gate_count = 1200;
        assert!(!a.same_layout(&b));
    }

    #[test]
    fn test_rotated_sweep_is_a_different_layout() {
        let a = sweep();
        let mut b = sweep();
        b.azimuths.rotate_left(180);
        assert_eq!(b.azimuths[0], 180.5);
        assert!(!a.same_layout(&b));
    }
}

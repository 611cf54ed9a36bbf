//! The fixed lon/lat grid every product stream is reprojected onto.

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::error::{LoopError, LoopResult};

/// Statute miles per nautical mile.
const MILES_PER_NM: f64 = 1.150_779_4;

/// Extra latitude margin added to radius-derived extents (degrees).
const LAT_EXTENT_FUDGE: f64 = 0.053;

/// Equirectangular target grid centered on a site.
///
/// Row 0 is the northern edge, column 0 the western edge. Cells are square
/// in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetGrid {
    pub center_lon: f64,
    pub center_lat: f64,
    pub lon_half_width: f64,
    pub lat_half_width: f64,
    pub resolution: f64,
    width: usize,
    height: usize,
}

impl TargetGrid {
    pub fn new(
        center_lon: f64,
        center_lat: f64,
        lon_half_width: f64,
        lat_half_width: f64,
        resolution: f64,
    ) -> LoopResult<Self> {
        if !(resolution > 0.0) {
            return Err(LoopError::InvalidGrid(format!(
                "resolution must be positive, got {}",
                resolution
            )));
        }
        if !(lon_half_width > 0.0 && lat_half_width > 0.0) {
            return Err(LoopError::InvalidGrid(format!(
                "half widths must be positive, got {} x {}",
                lon_half_width, lat_half_width
            )));
        }
        if center_lat.abs() + lat_half_width >= 90.0 {
            return Err(LoopError::InvalidGrid(format!(
                "grid centered at latitude {} with half width {} crosses a pole",
                center_lat, lat_half_width
            )));
        }

        let width = (2.0 * lon_half_width / resolution).ceil() as usize;
        let height = (2.0 * lat_half_width / resolution).ceil() as usize;

        Ok(Self {
            center_lon,
            center_lat,
            lon_half_width,
            lat_half_width,
            resolution,
            width,
            height,
        })
    }

    /// Build a grid covering `radius_miles` statute miles around the center.
    ///
    /// Latitude extent is `nm / 60` degrees plus a small margin; longitude
    /// extent is widened by `1 / cos(lat)` so the map covers the same ground
    /// distance east-west.
    pub fn from_radius_miles(
        center_lon: f64,
        center_lat: f64,
        radius_miles: f64,
        resolution: f64,
    ) -> LoopResult<Self> {
        if !(radius_miles > 0.0) {
            return Err(LoopError::InvalidGrid(format!(
                "radius must be positive, got {}",
                radius_miles
            )));
        }
        let nm = radius_miles / MILES_PER_NM;
        let lat_half = nm / 60.0 + LAT_EXTENT_FUDGE;
        let lon_half = nm / (center_lat.to_radians().cos() * 60.0);

        Self::new(center_lon, center_lat, lon_half, lat_half, resolution)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    pub fn min_lon(&self) -> f64 {
        self.center_lon - self.lon_half_width
    }

    pub fn max_lat(&self) -> f64 {
        self.center_lat + self.lat_half_width
    }

    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(
            self.min_lon(),
            self.max_lat() - self.height as f64 * self.resolution,
            self.min_lon() + self.width as f64 * self.resolution,
            self.max_lat(),
        )
    }

    /// Geographic center of cell (col, row) as (lon, lat).
    pub fn cell_center(&self, col: usize, row: usize) -> (f64, f64) {
        let lon = self.min_lon() + (col as f64 + 0.5) * self.resolution;
        let lat = self.max_lat() - (row as f64 + 0.5) * self.resolution;
        (lon, lat)
    }

    /// Fractional pixel position (x, y) of a geographic point.
    pub fn geo_to_pixel(&self, lon: f64, lat: f64) -> (f64, f64) {
        let x = (lon - self.min_lon()) / self.resolution;
        let y = (self.max_lat() - lat) / self.resolution;
        (x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radius_extent_matches_plot_math() {
        let grid = TargetGrid::from_radius_miles(-111.4223, 34.7443, 200.0, 0.005).unwrap();

        let nm = 200.0 / 1.1507794;
        assert!((grid.lat_half_width - (nm / 60.0 + 0.053)).abs() < 1e-9);
        assert!(grid.lon_half_width > grid.lat_half_width - 0.053);

        let (w, h) = grid.dimensions();
        assert!(w > 0 && h > 0);
        assert_eq!(grid.cell_count(), w * h);
    }

    #[test]
    fn test_cell_center_and_pixel_roundtrip() {
        let grid = TargetGrid::new(-111.0, 35.0, 1.0, 1.0, 0.1).unwrap();
        assert_eq!(grid.dimensions(), (20, 20));

        let (lon, lat) = grid.cell_center(0, 0);
        assert!((lon - -111.95).abs() < 1e-9);
        assert!((lat - 35.95).abs() < 1e-9);

        let (x, y) = grid.geo_to_pixel(lon, lat);
        assert!((x - 0.5).abs() < 1e-9);
        assert!((y - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_degenerate_grids() {
        assert!(TargetGrid::new(0.0, 0.0, 1.0, 1.0, 0.0).is_err());
        assert!(TargetGrid::new(0.0, 0.0, -1.0, 1.0, 0.1).is_err());
        assert!(TargetGrid::new(0.0, 89.5, 1.0, 1.0, 0.1).is_err());
        assert!(TargetGrid::from_radius_miles(0.0, 0.0, 0.0, 0.1).is_err());
    }
}

//! Fixed-grid geometry of a geostationary imager.
//!
//! Scan angles follow the GOES-R convention (x-axis sweep, radians from
//! nadir). Pixel (i, j) sits at scan angle
//! `(x_offset + i * x_scale, y_offset + j * y_scale)`, exactly how the
//! packed `x`/`y` coordinate variables of an ABI L2 file describe it.
//!
//! Reference: GOES-R Product Definition and Users' Guide (PUG) Volume 4, 4.2.8

use crate::error::{ProjectionError, ProjectionResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Geostationary {
    /// Satellite altitude above the ellipsoid (meters)
    pub perspective_point_height: f64,
    /// Equatorial radius (meters)
    pub semi_major_axis: f64,
    /// Polar radius (meters)
    pub semi_minor_axis: f64,
    /// Sub-satellite longitude (degrees, negative west)
    pub longitude_origin: f64,
    pub x_offset: f64,
    pub x_scale: f64,
    pub y_offset: f64,
    pub y_scale: f64,
    pub nx: usize,
    pub ny: usize,
}

impl Geostationary {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        perspective_point_height: f64,
        semi_major_axis: f64,
        semi_minor_axis: f64,
        longitude_origin: f64,
        x_offset: f64,
        x_scale: f64,
        y_offset: f64,
        y_scale: f64,
        nx: usize,
        ny: usize,
    ) -> ProjectionResult<Self> {
        let geo = Self {
            perspective_point_height,
            semi_major_axis,
            semi_minor_axis,
            longitude_origin,
            x_offset,
            x_scale,
            y_offset,
            y_scale,
            nx,
            ny,
        };
        geo.validate()?;
        Ok(geo)
    }

    /// GOES-East CONUS sector (2 km bands), handy for tests and defaults.
    pub fn goes16_conus_2km() -> Self {
        Self {
            perspective_point_height: 35_786_023.0,
            semi_major_axis: 6_378_137.0,
            semi_minor_axis: 6_356_752.314_14,
            longitude_origin: -75.0,
            x_offset: -0.101_332,
            x_scale: 5.6e-5,
            y_offset: 0.128_212,
            y_scale: -5.6e-5,
            nx: 2500,
            ny: 1500,
        }
    }

    pub fn validate(&self) -> ProjectionResult<()> {
        if self.nx == 0 || self.ny == 0 {
            return Err(ProjectionError::InvalidGeometry(format!(
                "empty scan grid {}x{}",
                self.nx, self.ny
            )));
        }
        if self.x_scale == 0.0 || self.y_scale == 0.0 {
            return Err(ProjectionError::InvalidGeometry(
                "zero scan-angle spacing".to_string(),
            ));
        }
        if !(self.perspective_point_height > 0.0
            && self.semi_major_axis > 0.0
            && self.semi_minor_axis > 0.0)
        {
            return Err(ProjectionError::InvalidGeometry(
                "non-positive ellipsoid or satellite height".to_string(),
            ));
        }
        Ok(())
    }

    /// Distance from the earth's center to the satellite (meters).
    #[inline]
    fn h(&self) -> f64 {
        self.perspective_point_height + self.semi_major_axis
    }

    /// Scan angles (radians) of a possibly fractional pixel position.
    #[inline]
    pub fn pixel_to_scan(&self, i: f64, j: f64) -> (f64, f64) {
        (self.x_offset + i * self.x_scale, self.y_offset + j * self.y_scale)
    }

    #[inline]
    pub fn scan_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.x_offset) / self.x_scale, (y - self.y_offset) / self.y_scale)
    }

    /// Geographic (lon, lat) degrees seen at a scan angle, or None off the limb.
    pub fn scan_to_geo(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let h = self.h();
        let req = self.semi_major_axis;
        let rpol = self.semi_minor_axis;
        let (sin_x, cos_x) = x.sin_cos();
        let (sin_y, cos_y) = y.sin_cos();

        let a = sin_x.powi(2) + cos_x.powi(2) * (cos_y.powi(2) + (req / rpol).powi(2) * sin_y.powi(2));
        let b = -2.0 * h * cos_x * cos_y;
        let c = h.powi(2) - req.powi(2);

        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return None;
        }
        let rs = (-b - discriminant.sqrt()) / (2.0 * a);

        let sx = rs * cos_x * cos_y;
        let sy = -rs * sin_x;
        let sz = rs * cos_x * sin_y;

        let lat = ((req / rpol).powi(2) * sz / (h - sx).hypot(sy)).atan();
        let lon = self.longitude_origin.to_radians() - sy.atan2(h - sx);
        Some((lon.to_degrees(), lat.to_degrees()))
    }

    /// Scan angle (radians) at which a geographic point is seen, or None
    /// when the point is behind the limb.
    pub fn geo_to_scan(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        let h = self.h();
        let req = self.semi_major_axis;
        let rpol = self.semi_minor_axis;
        let lat_rad = lat.to_radians();
        let dlon = lon.to_radians() - self.longitude_origin.to_radians();

        let phi_c = ((rpol / req).powi(2) * lat_rad.tan()).atan();
        let e2 = 1.0 - (rpol / req).powi(2);
        let rc = rpol / (1.0 - e2 * phi_c.cos().powi(2)).sqrt();

        let sx = h - rc * phi_c.cos() * dlon.cos();
        let sy = -rc * phi_c.cos() * dlon.sin();
        let sz = rc * phi_c.sin();

        // behind the limb as seen from the satellite
        if sx <= 0.0 || h * (h - sx) < sy.powi(2) + (req / rpol).powi(2) * sz.powi(2) {
            return None;
        }

        let norm = (sx * sx + sy * sy + sz * sz).sqrt();
        Some(((-sy / norm).asin(), (sz / sx).atan()))
    }

    /// Flat index (`j * nx + i`) of the pixel nearest to a geographic point.
    pub fn nearest_index(&self, lon: f64, lat: f64) -> Option<usize> {
        let (x, y) = self.geo_to_scan(lon, lat)?;
        let (fi, fj) = self.scan_to_pixel(x, y);
        let (i, j) = (fi.round(), fj.round());
        if i < 0.0 || j < 0.0 || i >= self.nx as f64 || j >= self.ny as f64 {
            return None;
        }
        Some(j as usize * self.nx + i as usize)
    }

    /// Geographic center of the pixel at a flat index.
    pub fn index_to_geo(&self, index: usize) -> Option<(f64, f64)> {
        let (i, j) = (index % self.nx, index / self.nx);
        let (x, y) = self.pixel_to_scan(i as f64, j as f64);
        self.scan_to_geo(x, y)
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }

    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

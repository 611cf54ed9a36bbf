//! Geographic bounding boxes.

use serde::{Deserialize, Serialize};

/// A lon/lat bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lon < other.max_lon
            && self.max_lon > other.min_lon
            && self.min_lat < other.max_lat
            && self.max_lat > other.min_lat
    }

    /// Grow the box by `margin` degrees on every side.
    pub fn expand(&self, margin: f64) -> BoundingBox {
        BoundingBox {
            min_lon: self.min_lon - margin,
            min_lat: self.min_lat - margin,
            max_lon: self.max_lon + margin,
            max_lat: self.max_lat + margin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_and_intersects() {
        let a = BoundingBox::new(-112.0, 34.0, -110.0, 36.0);
        assert!(a.contains(-111.0, 35.0));
        assert!(!a.contains(-109.0, 35.0));

        let b = BoundingBox::new(-111.0, 35.0, -109.0, 37.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&BoundingBox::new(-100.0, 10.0, -99.0, 11.0)));
        assert!(a.expand(2.0).contains(-109.0, 35.0));
    }
}

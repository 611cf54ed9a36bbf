//! Map overlays: GeoJSON boundary/road layers and observatory site markers.

use std::path::Path;

use geojson::{Feature, GeoJson, Geometry, Value};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_polygon_mut, Blend};
use imageproc::point::Point;
use loop_common::TargetGrid;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::colormap::hex_to_rgb;
use crate::error::{RenderError, RenderResult};

/// Features farther than this from the map center (degrees) are dropped.
pub const DEFAULT_FILTER_RADIUS_DEG: f64 = 7.0;

/// Stroke style for a line layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineStyle {
    pub color: [u8; 3],
    /// Opacity in 0..=1
    pub alpha: f32,
    #[serde(default = "default_line_width")]
    pub width: u32,
}

fn default_line_width() -> u32 {
    1
}

impl LineStyle {
    pub fn new(color: [u8; 3], alpha: f32) -> Self {
        Self {
            color,
            alpha,
            width: 1,
        }
    }

    /// Parse a `#rrggbb` stroke color.
    pub fn from_hex(hex: &str, alpha: f32) -> RenderResult<Self> {
        let color = hex_to_rgb(hex)
            .ok_or_else(|| RenderError::InvalidRaster(format!("bad color '{}'", hex)))?;
        Ok(Self::new(color, alpha))
    }

    fn rgba(&self) -> Rgba<u8> {
        let a = (self.alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
        Rgba([self.color[0], self.color[1], self.color[2], a])
    }
}

/// Selects features by a string property (e.g. road `class`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyFilter {
    pub property: String,
    pub values: Vec<String>,
}

impl PropertyFilter {
    fn accepts(&self, feature: &Feature) -> bool {
        feature
            .property(&self.property)
            .and_then(|v| v.as_str())
            .map(|v| self.values.iter().any(|want| want == v))
            .unwrap_or(false)
    }
}

/// A set of polylines drawn with one style. Polygons contribute their rings.
#[derive(Debug, Clone)]
pub struct OverlayLayer {
    pub name: String,
    pub style: LineStyle,
    /// Lines as (lon, lat) vertex lists
    pub lines: Vec<Vec<(f64, f64)>>,
}

impl OverlayLayer {
    /// Load line and polygon geometries from a GeoJSON file, keeping features
    /// with at least one vertex within `radius_deg` of `center`.
    pub fn load_geojson(
        name: &str,
        path: &Path,
        style: LineStyle,
        center: (f64, f64),
        radius_deg: f64,
        filter: Option<&PropertyFilter>,
    ) -> RenderResult<Self> {
        let overlay_err = |message: String| RenderError::Overlay {
            path: path.display().to_string(),
            message,
        };
        let text = std::fs::read_to_string(path).map_err(|e| overlay_err(e.to_string()))?;
        let geojson: GeoJson = text.parse().map_err(|e: geojson::Error| overlay_err(e.to_string()))?;

        let features: Vec<Feature> = match geojson {
            GeoJson::FeatureCollection(fc) => fc.features,
            GeoJson::Feature(f) => vec![f],
            GeoJson::Geometry(g) => vec![Feature::from(g)],
        };

        let total = features.len();
        let mut lines = Vec::new();
        let mut kept = 0usize;
        for feature in &features {
            if let Some(filter) = filter {
                if !filter.accepts(feature) {
                    continue;
                }
            }
            let Some(geometry) = &feature.geometry else {
                continue;
            };
            let mut feature_lines = Vec::new();
            collect_lines(geometry, &mut feature_lines);

            let near = feature_lines
                .iter()
                .flatten()
                .any(|&(lon, lat)| (lon - center.0).hypot(lat - center.1) <= radius_deg);
            if near {
                kept += 1;
                lines.extend(feature_lines);
            }
        }

        debug!(layer = name, total, kept, "Loaded overlay layer");
        Ok(Self {
            name: name.to_string(),
            style,
            lines,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn draw(&self, img: &mut RgbaImage, grid: &TargetGrid) {
        let color = self.style.rgba();
        let width = self.style.width.max(1) as i32;
        let mut canvas = Blend(std::mem::take(img));

        for line in &self.lines {
            for pair in line.windows(2) {
                let (x0, y0) = grid.geo_to_pixel(pair[0].0, pair[0].1);
                let (x1, y1) = grid.geo_to_pixel(pair[1].0, pair[1].1);
                if !segment_near_image(&canvas.0, (x0, y0), (x1, y1)) {
                    continue;
                }
                for offset in 0..width {
                    let d = (offset - width / 2) as f32;
                    draw_line_segment_mut(
                        &mut canvas,
                        (x0 as f32 + d, y0 as f32),
                        (x1 as f32 + d, y1 as f32),
                        color,
                    );
                }
            }
        }

        *img = canvas.0;
    }
}

fn segment_near_image(img: &RgbaImage, a: (f64, f64), b: (f64, f64)) -> bool {
    let (w, h) = (img.width() as f64, img.height() as f64);
    let outside = |lo: f64, hi: f64, max: f64| hi < -1.0 || lo > max + 1.0;
    !(outside(a.0.min(b.0), a.0.max(b.0), w) || outside(a.1.min(b.1), a.1.max(b.1), h))
}

fn collect_lines(geometry: &Geometry, out: &mut Vec<Vec<(f64, f64)>>) {
    let to_line = |coords: &Vec<Vec<f64>>| -> Vec<(f64, f64)> {
        coords
            .iter()
            .filter(|p| p.len() >= 2)
            .map(|p| (p[0], p[1]))
            .collect()
    };
    match &geometry.value {
        Value::LineString(line) => out.push(to_line(line)),
        Value::MultiLineString(lines) | Value::Polygon(lines) => {
            out.extend(lines.iter().map(to_line));
        }
        Value::MultiPolygon(polygons) => {
            for rings in polygons {
                out.extend(rings.iter().map(to_line));
            }
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                collect_lines(g, out);
            }
        }
        Value::Point(_) | Value::MultiPoint(_) => {}
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerShape {
    Circle,
    Star,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteMarker {
    pub name: String,
    pub lon: f64,
    pub lat: f64,
    pub color: [u8; 3],
    pub shape: MarkerShape,
    /// Marker radius in pixels
    pub size: u32,
}

impl SiteMarker {
    fn new(name: &str, lon: f64, lat: f64, color: [u8; 3], shape: MarkerShape, size: u32) -> Self {
        Self {
            name: name.to_string(),
            lon,
            lat,
            color,
            shape,
            size,
        }
    }

    /// Northern Arizona observatories plus the southern Arizona neighbours.
    pub fn arizona_observatories() -> Vec<SiteMarker> {
        const RED: [u8; 3] = [255, 0, 0];
        const PURPLE: [u8; 3] = [128, 0, 128];
        vec![
            Self::new("Lowell", -111.664444, 35.202778, RED, MarkerShape::Star, 8),
            Self::new("DCT", -111.4223, 34.7443, RED, MarkerShape::Circle, 6),
            Self::new("Anderson Mesa", -111.535833, 35.096944, RED, MarkerShape::Circle, 6),
            Self::new("KPNO", -111.5967, 31.9583, PURPLE, MarkerShape::Circle, 5),
            Self::new("LBT", -109.889064, 32.701308, PURPLE, MarkerShape::Circle, 5),
            Self::new("MMT", -110.885, 31.6883, PURPLE, MarkerShape::Circle, 5),
        ]
    }

    fn draw(&self, img: &mut RgbaImage, grid: &TargetGrid) {
        let (x, y) = grid.geo_to_pixel(self.lon, self.lat);
        let (cx, cy) = (x.round() as i32, y.round() as i32);
        let r = self.size.max(1) as i32;
        if cx < -r || cy < -r || cx > img.width() as i32 + r || cy > img.height() as i32 + r {
            return;
        }
        let color = Rgba([self.color[0], self.color[1], self.color[2], 242]);
        let mut canvas = Blend(std::mem::take(img));

        match self.shape {
            MarkerShape::Circle => draw_filled_circle_mut(&mut canvas, (cx, cy), r, color),
            MarkerShape::Star => draw_polygon_mut(&mut canvas, &star_points(cx, cy, r), color),
        }

        *img = canvas.0;
    }
}

fn star_points(cx: i32, cy: i32, r: i32) -> Vec<Point<i32>> {
    let outer = r as f64;
    let inner = outer * 0.4;
    let mut points: Vec<Point<i32>> = (0..10)
        .map(|k| {
            let radius = if k % 2 == 0 { outer } else { inner };
            let theta = (k as f64 * 36.0 - 90.0).to_radians();
            Point::new(
                cx + (radius * theta.cos()).round() as i32,
                cy + (radius * theta.sin()).round() as i32,
            )
        })
        .collect();
    points.dedup();
    points
}

/// Everything drawn on top of the colorized raster.
#[derive(Debug, Clone, Default)]
pub struct Overlays {
    pub layers: Vec<OverlayLayer>,
    pub markers: Vec<SiteMarker>,
}

impl Overlays {
    pub fn new(layers: Vec<OverlayLayer>, markers: Vec<SiteMarker>) -> Self {
        Self { layers, markers }
    }

    pub fn draw(&self, img: &mut RgbaImage, grid: &TargetGrid) {
        if img.width() as usize != grid.width() || img.height() as usize != grid.height() {
            warn!(
                image = ?img.dimensions(),
                grid = ?grid.dimensions(),
                "Overlay grid does not match image; skipping overlays"
            );
            return;
        }
        for layer in &self.layers {
            layer.draw(img, grid);
        }
        for marker in &self.markers {
            marker.draw(img, grid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn grid() -> TargetGrid {
        TargetGrid::new(-111.4223, 34.7443, 1.0, 1.0, 0.01).unwrap()
    }

    fn write_geojson(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    const ROADS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"class": "Interstate"},
             "geometry": {"type": "LineString", "coordinates": [[-112.0, 35.2], [-111.0, 35.2]]}},
            {"type": "Feature", "properties": {"class": "State"},
             "geometry": {"type": "LineString", "coordinates": [[-112.0, 34.5], [-111.0, 34.5]]}},
            {"type": "Feature", "properties": {"class": "Interstate"},
             "geometry": {"type": "LineString", "coordinates": [[-80.0, 35.0], [-79.0, 35.0]]}}
        ]
    }"#;

    #[test]
    fn test_load_filters_by_distance_and_property() {
        let f = write_geojson(ROADS);
        let filter = PropertyFilter {
            property: "class".to_string(),
            values: vec!["Interstate".to_string(), "Federal".to_string()],
        };
        let layer = OverlayLayer::load_geojson(
            "roads",
            f.path(),
            LineStyle::new([255, 215, 0], 0.55),
            (-111.4223, 34.7443),
            DEFAULT_FILTER_RADIUS_DEG,
            Some(&filter),
        )
        .unwrap();

        // the State road fails the filter, the east-coast interstate is too far
        assert_eq!(layer.lines.len(), 1);
        assert_eq!(layer.lines[0][0], (-112.0, 35.2));
    }

    #[test]
    fn test_polygons_contribute_rings() {
        let f = write_geojson(
            r#"{"type": "Feature", "properties": {},
                "geometry": {"type": "Polygon", "coordinates":
                  [[[-111.5, 34.5], [-111.3, 34.5], [-111.3, 34.9], [-111.5, 34.5]]]}}"#,
        );
        let layer = OverlayLayer::load_geojson(
            "counties",
            f.path(),
            LineStyle::from_hex("#ff0092", 0.25).unwrap(),
            (-111.4223, 34.7443),
            DEFAULT_FILTER_RADIUS_DEG,
            None,
        )
        .unwrap();
        assert_eq!(layer.lines.len(), 1);
        assert_eq!(layer.lines[0].len(), 4);
    }

    #[test]
    fn test_bad_geojson_is_overlay_error() {
        let f = write_geojson("{ nope");
        let err = OverlayLayer::load_geojson(
            "x",
            f.path(),
            LineStyle::new([0, 0, 0], 1.0),
            (0.0, 0.0),
            7.0,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::Overlay { .. }));
    }

    #[test]
    fn test_lines_and_markers_are_drawn() {
        let g = grid();
        let mut img = RgbaImage::from_pixel(g.width() as u32, g.height() as u32, Rgba([0, 0, 0, 255]));
        let layer = OverlayLayer {
            name: "test".to_string(),
            style: LineStyle::new([255, 255, 255], 1.0),
            lines: vec![vec![(-112.0, 34.7443), (-110.9, 34.7443)]],
        };
        let overlays = Overlays::new(vec![layer], SiteMarker::arizona_observatories());
        overlays.draw(&mut img, &g);

        let (x, y) = g.geo_to_pixel(-111.9, 34.7443);
        let row = y.round() as u32;
        let hit = (row - 1..=row + 1).any(|r| img.get_pixel(x as u32, r)[1] == 255);
        assert!(hit, "line should be drawn in white");

        let (x, y) = g.geo_to_pixel(-111.4223, 34.7443);
        let px = img.get_pixel(x.round() as u32, y.round() as u32);
        assert!(px[0] > 200 && px[1] < 50, "DCT marker should be red, got {:?}", px);
    }

    #[test]
    fn test_default_sites() {
        let sites = SiteMarker::arizona_observatories();
        assert_eq!(sites.len(), 6);
        assert_eq!(sites[0].shape, MarkerShape::Star);
        assert!(sites.iter().filter(|s| s.color == [128, 0, 128]).count() == 3);
    }
}

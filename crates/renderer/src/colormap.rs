//! Value-to-color mapping for reprojected rasters.

use image::Rgba;

/// A color anchored at a data value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub value: f32,
    pub color: [u8; 3],
}

impl ColorStop {
    pub const fn new(value: f32, color: [u8; 3]) -> Self {
        Self { value, color }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Colormap {
    /// Linear interpolation between stops, clamped at both ends.
    Gradient(Vec<ColorStop>),
    /// One color per `[levels[i], levels[i+1])` bin; `under`/`over` outside.
    Levels {
        levels: Vec<f32>,
        colors: Vec<[u8; 3]>,
        under: Option<[u8; 3]>,
        over: Option<[u8; 3]>,
    },
}

impl Colormap {
    /// Infrared brightness temperature, 160-330 K.
    ///
    /// Cold cloud tops get a purple/white band, mid temperatures run red to
    /// violet, and the warm end is a grey ramp that turns back to white.
    pub fn brightness_temperature() -> Self {
        Colormap::Gradient(vec![
            ColorStop::new(160.0, [47, 20, 59]),
            ColorStop::new(169.0, [68, 94, 167]),
            ColorStop::new(177.5, [226, 217, 226]),
            ColorStop::new(186.0, [168, 72, 52]),
            ColorStop::new(194.9, [80, 22, 58]),
            ColorStop::new(195.0, [255, 0, 0]),
            ColorStop::new(210.0, [255, 180, 90]),
            ColorStop::new(225.0, [128, 255, 180]),
            ColorStop::new(240.0, [40, 180, 240]),
            ColorStop::new(254.9, [128, 0, 255]),
            ColorStop::new(255.0, [255, 255, 255]),
            ColorStop::new(300.0, [0, 0, 0]),
            ColorStop::new(330.0, [255, 255, 255]),
        ])
    }

    /// NWS base reflectivity, -30 to 70 dBZ in 5 dBZ bins.
    pub fn nws_reflectivity() -> Self {
        const COLORS: [&str; 22] = [
            "#ccffff", "#cc99cc", "#996699", "#663366", "#cccc99", "#999966", "#646464",
            "#04e9e7", "#019ff4", "#0300f4", "#02fd02", "#01c501", "#008e00", "#fdf802",
            "#e5bc00", "#fd9500", "#fd0000", "#d40000", "#bc0000", "#f800fd", "#9854c6",
            "#fdfdfd",
        ];
        let colors: Vec<[u8; 3]> = COLORS
            .iter()
            .filter_map(|hex| hex_to_rgb(hex))
            .collect();
        let levels: Vec<f32> = (0..21).map(|i| -30.0 + 5.0 * i as f32).collect();

        // first and last colors extend the ends
        Colormap::Levels {
            under: colors.first().copied(),
            over: colors.last().copied(),
            colors: colors[1..colors.len() - 1].to_vec(),
            levels,
        }
    }

    /// Look up a named colormap.
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "brightness_temperature" | "goes_ir" => Some(Self::brightness_temperature()),
            "nws_reflectivity" | "reflectivity" => Some(Self::nws_reflectivity()),
            _ => None,
        }
    }

    /// Stretch the colormap so its first and last anchors sit at `min` and `max`.
    pub fn with_range(self, min: f32, max: f32) -> Self {
        let Some((lo, hi)) = self.extent() else {
            return self;
        };
        if !(hi > lo) {
            return self;
        }
        let rescale = |v: f32| min + (v - lo) / (hi - lo) * (max - min);
        match self {
            Colormap::Gradient(stops) => Colormap::Gradient(
                stops
                    .into_iter()
                    .map(|s| ColorStop::new(rescale(s.value), s.color))
                    .collect(),
            ),
            Colormap::Levels {
                levels,
                colors,
                under,
                over,
            } => Colormap::Levels {
                levels: levels.into_iter().map(rescale).collect(),
                colors,
                under,
                over,
            },
        }
    }

    fn extent(&self) -> Option<(f32, f32)> {
        match self {
            Colormap::Gradient(stops) => Some((stops.first()?.value, stops.last()?.value)),
            Colormap::Levels { levels, .. } => Some((*levels.first()?, *levels.last()?)),
        }
    }

    /// Color for `value`, or None for NaN / values left uncolored.
    pub fn map(&self, value: f32) -> Option<Rgba<u8>> {
        if value.is_nan() {
            return None;
        }
        let rgb = match self {
            Colormap::Gradient(stops) => gradient_color(stops, value)?,
            Colormap::Levels {
                levels,
                colors,
                under,
                over,
            } => level_color(levels, colors, *under, *over, value)?,
        };
        Some(Rgba([rgb[0], rgb[1], rgb[2], 255]))
    }
}

fn gradient_color(stops: &[ColorStop], value: f32) -> Option<[u8; 3]> {
    let first = stops.first()?;
    let last = stops.last()?;
    if value <= first.value {
        return Some(first.color);
    }
    if value >= last.value {
        return Some(last.color);
    }

    let upper = stops.iter().position(|s| s.value >= value)?;
    let (lo, hi) = (&stops[upper - 1], &stops[upper]);
    let t = (value - lo.value) / (hi.value - lo.value);
    let lerp = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;

    Some([
        lerp(lo.color[0], hi.color[0]),
        lerp(lo.color[1], hi.color[1]),
        lerp(lo.color[2], hi.color[2]),
    ])
}

fn level_color(
    levels: &[f32],
    colors: &[[u8; 3]],
    under: Option<[u8; 3]>,
    over: Option<[u8; 3]>,
    value: f32,
) -> Option<[u8; 3]> {
    let first = *levels.first()?;
    let last = *levels.last()?;
    if value < first {
        return under;
    }
    if value >= last {
        return over;
    }
    let bin = levels.partition_point(|&l| l <= value).saturating_sub(1);
    colors.get(bin).copied()
}

/// Parse `#rrggbb`.
pub fn hex_to_rgb(hex: &str) -> Option<[u8; 3]> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some([r, g, b])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_clamps_and_interpolates() {
        let cmap = Colormap::Gradient(vec![
            ColorStop::new(0.0, [0, 0, 0]),
            ColorStop::new(10.0, [200, 100, 0]),
        ]);
        assert_eq!(cmap.map(-5.0), Some(Rgba([0, 0, 0, 255])));
        assert_eq!(cmap.map(5.0), Some(Rgba([100, 50, 0, 255])));
        assert_eq!(cmap.map(50.0), Some(Rgba([200, 100, 0, 255])));
        assert_eq!(cmap.map(f32::NAN), None);
    }

    #[test]
    fn test_brightness_temperature_range() {
        let cmap = Colormap::brightness_temperature();
        assert_eq!(cmap.map(330.0), Some(Rgba([255, 255, 255, 255])));
        assert_eq!(cmap.map(300.0), Some(Rgba([0, 0, 0, 255])));
        assert_eq!(cmap.map(195.0), Some(Rgba([255, 0, 0, 255])));
    }

    #[test]
    fn test_reflectivity_levels() {
        let cmap = Colormap::nws_reflectivity();
        // 20 dBZ starts the first green bin
        assert_eq!(cmap.map(20.0), Some(Rgba([0x02, 0xfd, 0x02, 255])));
        assert_eq!(cmap.map(24.9), Some(Rgba([0x02, 0xfd, 0x02, 255])));
        assert_eq!(cmap.map(-45.0), Some(Rgba([0xcc, 0xff, 0xff, 255])));
        assert_eq!(cmap.map(80.0), Some(Rgba([0xfd, 0xfd, 0xfd, 255])));
    }

    #[test]
    fn test_by_name() {
        assert!(Colormap::by_name("brightness_temperature").is_some());
        assert!(Colormap::by_name("nws_reflectivity").is_some());
        assert!(Colormap::by_name("viridis").is_none());
    }

    #[test]
    fn test_hex_to_rgb() {
        assert_eq!(hex_to_rgb("#ff0092"), Some([255, 0, 146]));
        assert_eq!(hex_to_rgb("fff"), None);
    }
}

//! Single-frame map rendering.
//!
//! A frame is the reprojected raster colorized through the stream's
//! colormap, with overlays and site markers drawn over it, optionally
//! resized to the published size, and topped with a black caption strip.

use std::io::Cursor;
use std::sync::Arc;

use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, ImageEncoder, Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use loop_common::TargetGrid;
use rayon::prelude::*;
use rusttype::Font;
use tracing::{debug, warn};

use crate::colormap::Colormap;
use crate::error::{RenderError, RenderResult};
use crate::overlay::Overlays;
use crate::text::draw_centered;

/// A raster already on the target grid (row 0 north), NaN where missing.
#[derive(Debug, Clone)]
pub struct RasterFrame {
    pub grid: TargetGrid,
    pub values: Vec<f32>,
    /// Caption lines drawn in the header strip, top to bottom.
    pub title_lines: Vec<String>,
}

impl RasterFrame {
    pub fn new(grid: TargetGrid, values: Vec<f32>, title_lines: Vec<String>) -> RenderResult<Self> {
        if values.len() != grid.cell_count() {
            return Err(RenderError::InvalidRaster(format!(
                "{} values for a {}x{} grid",
                values.len(),
                grid.width(),
                grid.height()
            )));
        }
        Ok(Self {
            grid,
            values,
            title_lines,
        })
    }
}

/// How a stream's frames look.
#[derive(Clone)]
pub struct FrameStyle {
    pub colormap: Colormap,
    /// Fill for cells with no data
    pub background: [u8; 3],
    pub font: Option<Arc<Font<'static>>>,
    /// Final image size; None keeps the grid size.
    pub output_size: Option<(u32, u32)>,
    /// Header strip height as a fraction of the image height
    pub header_fraction: f32,
}

impl FrameStyle {
    pub fn new(colormap: Colormap) -> Self {
        Self {
            colormap,
            background: [0x26, 0x26, 0x29],
            font: None,
            output_size: None,
            header_fraction: 0.045,
        }
    }

    pub fn with_font(mut self, font: Option<Arc<Font<'static>>>) -> Self {
        self.font = font;
        self
    }

    pub fn with_output_size(mut self, size: Option<(u32, u32)>) -> Self {
        self.output_size = size;
        self
    }
}

impl std::fmt::Debug for FrameStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameStyle")
            .field("colormap", &self.colormap)
            .field("background", &self.background)
            .field("font", &self.font.is_some())
            .field("output_size", &self.output_size)
            .field("header_fraction", &self.header_fraction)
            .finish()
    }
}

/// Turns a reprojected raster into PNG bytes.
pub trait FrameRenderer: Send + Sync {
    fn render_frame(
        &self,
        frame: &RasterFrame,
        overlays: &Overlays,
        style: &FrameStyle,
    ) -> RenderResult<Vec<u8>>;
}

/// Raster map renderer built on `image` and `imageproc`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MapFrameRenderer;

impl MapFrameRenderer {
    /// Render to an in-memory image without encoding.
    pub fn render_image(
        &self,
        frame: &RasterFrame,
        overlays: &Overlays,
        style: &FrameStyle,
    ) -> RenderResult<RgbaImage> {
        let mut img = colorize(frame, style)?;
        overlays.draw(&mut img, &frame.grid);

        if let Some((w, h)) = style.output_size {
            if (w, h) != img.dimensions() {
                img = imageops::resize(&img, w, h, FilterType::Triangle);
            }
        }

        draw_header(&mut img, &frame.title_lines, style);
        Ok(img)
    }
}

impl FrameRenderer for MapFrameRenderer {
    fn render_frame(
        &self,
        frame: &RasterFrame,
        overlays: &Overlays,
        style: &FrameStyle,
    ) -> RenderResult<Vec<u8>> {
        let img = self.render_image(frame, overlays, style)?;
        encode_png(&img)
    }
}

fn colorize(frame: &RasterFrame, style: &FrameStyle) -> RenderResult<RgbaImage> {
    let (width, height) = frame.grid.dimensions();
    if frame.values.len() != width * height {
        return Err(RenderError::InvalidRaster(format!(
            "{} values for a {}x{} grid",
            frame.values.len(),
            width,
            height
        )));
    }
    let bg = Rgba([style.background[0], style.background[1], style.background[2], 255]);

    let mut img = RgbaImage::new(width as u32, height as u32);
    img.par_chunks_mut(width * 4)
        .zip(frame.values.par_chunks(width))
        .for_each(|(row_px, row_values)| {
            for (px, &v) in row_px.chunks_exact_mut(4).zip(row_values) {
                let color = style.colormap.map(v).unwrap_or(bg);
                px.copy_from_slice(&color.0);
            }
        });

    let colored = frame.values.iter().filter(|v| !v.is_nan()).count();
    debug!(width, height, colored, "Colorized raster");
    Ok(img)
}

fn draw_header(img: &mut RgbaImage, lines: &[String], style: &FrameStyle) {
    if lines.is_empty() {
        return;
    }
    let strip = ((img.height() as f32 * style.header_fraction).round() as u32).max(1);
    draw_filled_rect_mut(
        img,
        Rect::at(0, 0).of_size(img.width(), strip),
        Rgba([0, 0, 0, 255]),
    );

    let Some(font) = &style.font else {
        warn!("No font configured; header captions skipped");
        return;
    };
    let line_height = strip as f32 / lines.len() as f32;
    let size = (line_height * 0.95).max(6.0);
    for (i, line) in lines.iter().enumerate() {
        let y = (i as f32 * line_height).round() as i32;
        draw_centered(img, font, size, y, Rgba([255, 255, 255, 255]), line);
    }
}

/// Encode an image as PNG.
pub fn encode_png(img: &RgbaImage) -> RenderResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    PngEncoder::new(&mut buf).write_image(
        img.as_raw(),
        img.width(),
        img.height(),
        ColorType::Rgba8,
    )?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colormap::ColorStop;

    fn grid() -> TargetGrid {
        TargetGrid::new(-111.4223, 34.7443, 0.5, 0.5, 0.01).unwrap()
    }

    fn style() -> FrameStyle {
        FrameStyle::new(Colormap::Gradient(vec![
            ColorStop::new(0.0, [0, 0, 0]),
            ColorStop::new(100.0, [255, 255, 255]),
        ]))
    }

    #[test]
    fn test_missing_values_use_background() {
        let g = grid();
        let mut values = vec![100.0f32; g.cell_count()];
        values[g.cell_count() - 1] = f32::NAN;
        let frame = RasterFrame::new(g, values, vec![]).unwrap();

        let img = MapFrameRenderer
            .render_image(&frame, &Overlays::default(), &style())
            .unwrap();
        assert_eq!(img.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        let (w, h) = img.dimensions();
        assert_eq!(img.get_pixel(w - 1, h - 1), &Rgba([0x26, 0x26, 0x29, 255]));
    }

    #[test]
    fn test_header_strip_is_black() {
        let g = grid();
        let frame = RasterFrame::new(
            g,
            vec![100.0; g.cell_count()],
            vec!["LINE ONE".to_string(), "LINE TWO".to_string()],
        )
        .unwrap();
        let img = MapFrameRenderer
            .render_image(&frame, &Overlays::default(), &style())
            .unwrap();
        assert_eq!(img.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(img.get_pixel(0, img.height() - 1), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_output_resize_and_png_signature() {
        let g = grid();
        let frame = RasterFrame::new(g, vec![50.0; g.cell_count()], vec![]).unwrap();
        let style = style().with_output_size(Some((70, 70)));

        let img = MapFrameRenderer
            .render_image(&frame, &Overlays::default(), &style)
            .unwrap();
        assert_eq!(img.dimensions(), (70, 70));

        let png = MapFrameRenderer
            .render_frame(&frame, &Overlays::default(), &style)
            .unwrap();
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
    }

    #[test]
    fn test_wrong_length_is_rejected() {
        let err = RasterFrame::new(grid(), vec![1.0; 3], vec![]).unwrap_err();
        assert!(matches!(err, RenderError::InvalidRaster(_)));
    }
}

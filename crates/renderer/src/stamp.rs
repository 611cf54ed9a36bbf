//! The "stale data" stamp applied to published frames that are too old.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use rusttype::Font;
use tracing::warn;

use crate::error::RenderResult;
use crate::frame::encode_png;
use crate::text::draw_centered;

/// Saturation and value of the tinted watermark, on a 0-255 scale.
const TINT_SATURATION: u8 = 200;
const TINT_VALUE: u8 = 200;

/// Watermark opacity divisor.
const ALPHA_DIVISOR: f32 = 1.75;

const CAPTION_COLOR: Rgba<u8> = Rgba([255, 76, 76, 255]);
const CAPTION_SIZE: f32 = 24.0;
const CAPTION_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Marks a frame as stale: a hue-tinted watermark plus the current time.
#[derive(Clone)]
pub struct StaleStamp {
    /// Tinted watermark, composited centered over the frame
    watermark: Option<RgbaImage>,
    /// Tint hue on a 0-255 scale
    hue: u8,
    font: Option<Arc<Font<'static>>>,
}

impl StaleStamp {
    pub fn new(watermark: Option<RgbaImage>, hue: u8, font: Option<Arc<Font<'static>>>) -> Self {
        Self {
            watermark: watermark.map(|w| tint(&w, hue)),
            hue,
            font,
        }
    }

    /// Load the watermark image from disk.
    pub fn from_file(
        watermark_path: Option<&Path>,
        hue: u8,
        font: Option<Arc<Font<'static>>>,
    ) -> RenderResult<Self> {
        let watermark = match watermark_path {
            Some(path) => Some(image::open(path)?.to_rgba8()),
            None => None,
        };
        Ok(Self::new(watermark, hue, font))
    }

    /// Stamp an image in place.
    pub fn apply(&self, img: &mut RgbaImage, now: DateTime<Utc>) {
        match &self.watermark {
            Some(mark) => composite_centered(img, mark),
            None => tint_band(img, self.hue),
        }

        let caption = now.format(CAPTION_FORMAT).to_string();
        match &self.font {
            Some(font) => {
                let y = (img.height() as f32 * 0.8) as i32;
                draw_centered(img, font, CAPTION_SIZE, y, CAPTION_COLOR, &caption);
            }
            None => warn!(caption = %caption, "No font configured; stale caption skipped"),
        }
    }

    /// Read `src`, stamp it, and write the PNG to `dest`.
    pub fn stamp_file(&self, src: &Path, dest: &Path, now: DateTime<Utc>) -> RenderResult<()> {
        let mut img = image::open(src)?.to_rgba8();
        self.apply(&mut img, now);
        std::fs::write(dest, encode_png(&img)?)?;
        Ok(())
    }
}

impl std::fmt::Debug for StaleStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaleStamp")
            .field("watermark", &self.watermark.as_ref().map(|w| w.dimensions()))
            .field("hue", &self.hue)
            .field("font", &self.font.is_some())
            .finish()
    }
}

/// Recolor every pixel to one hue, keeping a reduced alpha.
fn tint(img: &RgbaImage, hue: u8) -> RgbaImage {
    let [r, g, b] = hsv_to_rgb(hue, TINT_SATURATION, TINT_VALUE);
    let mut out = img.clone();
    for px in out.pixels_mut() {
        let alpha = (px[3] as f32 / ALPHA_DIVISOR) as u8;
        *px = Rgba([r, g, b, alpha]);
    }
    out
}

fn composite_centered(img: &mut RgbaImage, mark: &RgbaImage) {
    let (w, h) = img.dimensions();
    let scaled;
    let mark = if mark.width() > w || mark.height() > h {
        let ratio = (w as f32 / mark.width() as f32).min(h as f32 / mark.height() as f32);
        let nw = ((mark.width() as f32 * ratio) as u32).max(1);
        let nh = ((mark.height() as f32 * ratio) as u32).max(1);
        scaled = imageops::resize(mark, nw, nh, FilterType::Triangle);
        &scaled
    } else {
        mark
    };
    let x = (w - mark.width()) / 2;
    let y = (h - mark.height()) / 2;
    imageops::overlay(img, mark, x as i64, y as i64);
}

/// Fallback when no watermark image is configured: a translucent diagonal band.
fn tint_band(img: &mut RgbaImage, hue: u8) {
    let [r, g, b] = hsv_to_rgb(hue, TINT_SATURATION, TINT_VALUE);
    let alpha = 255.0 / ALPHA_DIVISOR / 255.0;
    let (w, h) = (img.width() as f32, img.height() as f32);
    let half_band = w / 8.0;

    for (x, y, px) in img.enumerate_pixels_mut() {
        let diagonal_x = (h - y as f32) * w / h;
        if (x as f32 - diagonal_x).abs() <= half_band {
            for (c, tint) in px.0.iter_mut().take(3).zip([r, g, b]) {
                *c = (*c as f32 * (1.0 - alpha) + tint as f32 * alpha).round() as u8;
            }
        }
    }
}

/// HSV to RGB with every component on a 0-255 scale.
pub fn hsv_to_rgb(h: u8, s: u8, v: u8) -> [u8; 3] {
    let h = h as f32 / 255.0 * 6.0;
    let s = s as f32 / 255.0;
    let v = v as f32 / 255.0;

    let sector = h.floor();
    let f = h - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    let (r, g, b) = match sector as u32 % 6 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    let to_u8 = |c: f32| (c * 255.0).round() as u8;
    [to_u8(r), to_u8(g), to_u8(b)]
}

//! Font loading and caption drawing.

use std::path::Path;

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use rusttype::{point, Font, Scale};

use crate::error::{RenderError, RenderResult};

/// Load a TrueType font from disk.
pub fn load_font(path: &Path) -> RenderResult<Font<'static>> {
    let data = std::fs::read(path)
        .map_err(|e| RenderError::Font(format!("{}: {}", path.display(), e)))?;
    Font::try_from_vec(data)
        .ok_or_else(|| RenderError::Font(format!("{}: not a usable TrueType font", path.display())))
}

/// Rendered width of `text` in pixels.
pub fn text_width(font: &Font<'_>, scale: Scale, text: &str) -> i32 {
    font.layout(text, scale, point(0.0, 0.0))
        .filter_map(|glyph| {
            let advance = glyph.unpositioned().h_metrics().advance_width;
            Some(glyph.position().x + advance)
        })
        .fold(0.0f32, f32::max)
        .ceil() as i32
}

/// Draw `text` horizontally centered on the image with its top at `y`.
pub fn draw_centered(
    img: &mut RgbaImage,
    font: &Font<'_>,
    size: f32,
    y: i32,
    color: Rgba<u8>,
    text: &str,
) {
    let scale = Scale::uniform(size);
    let x = (img.width() as i32 - text_width(font, scale, text)) / 2;
    draw_text_mut(img, color, x.max(0), y, scale, font, text);
}

/// Draw `text` with its top-left corner at (x, y).
pub fn draw_at(
    img: &mut RgbaImage,
    font: &Font<'_>,
    size: f32,
    x: i32,
    y: i32,
    color: Rgba<u8>,
    text: &str,
) {
    draw_text_mut(img, color, x, y, Scale::uniform(size), font, text);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_font_is_an_error() {
        let err = load_font(Path::new("/nonexistent/font.ttf")).unwrap_err();
        assert!(matches!(err, RenderError::Font(_)));
    }

    #[test]
    fn test_garbage_font_is_rejected() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"not a font").unwrap();
        assert!(load_font(tmp.path()).is_err());
    }
}

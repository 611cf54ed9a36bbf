//! Animated loop encoding (GIF in-process, MP4 through ffmpeg).

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Command;

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};
use tracing::debug;

use crate::error::{RenderError, RenderResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationFormat {
    Gif,
    Mp4,
}

impl AnimationFormat {
    /// Pick the format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> RenderResult<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "gif" => Ok(AnimationFormat::Gif),
            "mp4" => Ok(AnimationFormat::Mp4),
            _ => Err(RenderError::UnsupportedFormat(path.display().to_string())),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AnimationFormat::Gif => "gif",
            AnimationFormat::Mp4 => "mp4",
        }
    }
}

/// Encodes an ordered frame sequence into an animation file's bytes.
pub trait AnimationEncoder: Send + Sync {
    fn encode(
        &self,
        frames: &[RgbaImage],
        format: AnimationFormat,
        frame_ms: u32,
    ) -> RenderResult<Vec<u8>>;
}

/// GIF through the `image` crate; MP4 through an `ffmpeg` executable.
#[derive(Debug, Clone)]
pub struct FrameAnimator {
    ffmpeg: PathBuf,
}

impl Default for FrameAnimator {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }
}

impl FrameAnimator {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    fn encode_gif(&self, frames: &[RgbaImage], frame_ms: u32) -> RenderResult<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut encoder = GifEncoder::new(&mut buf);
            encoder.set_repeat(Repeat::Infinite)?;
            let delay = Delay::from_numer_denom_ms(frame_ms, 1);
            encoder.encode_frames(
                frames
                    .iter()
                    .map(|img| Frame::from_parts(img.clone(), 0, 0, delay)),
            )?;
        }
        Ok(buf.into_inner())
    }

    fn encode_mp4(&self, frames: &[RgbaImage], frame_ms: u32) -> RenderResult<Vec<u8>> {
        let workdir = tempfile::TempDir::new()?;
        for (i, frame) in frames.iter().enumerate() {
            frame.save(workdir.path().join(format!("frame_{:04}.png", i)))?;
        }
        let output = workdir.path().join("out.mp4");
        let fps = (1000.0 / frame_ms.max(1) as f64).to_string();

        let result = Command::new(&self.ffmpeg)
            .arg("-y")
            .args(["-loglevel", "error"])
            .args(["-framerate", fps.as_str()])
            .arg("-i")
            .arg(workdir.path().join("frame_%04d.png"))
            .args(["-c:v", "libx264"])
            .args(["-vf", "format=yuv420p,pad=ceil(iw/2)*2:ceil(ih/2)*2"])
            .arg(&output)
            .output()
            .map_err(|e| RenderError::Encoder(format!("failed to run {}: {}", self.ffmpeg.display(), e)))?;

        if !result.status.success() {
            return Err(RenderError::Encoder(format!(
                "{} exited with {}: {}",
                self.ffmpeg.display(),
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        Ok(std::fs::read(&output)?)
    }
}

impl AnimationEncoder for FrameAnimator {
    fn encode(
        &self,
        frames: &[RgbaImage],
        format: AnimationFormat,
        frame_ms: u32,
    ) -> RenderResult<Vec<u8>> {
        if frames.is_empty() {
            return Err(RenderError::Encoder("no frames to encode".to_string()));
        }
        let bytes = match format {
            AnimationFormat::Gif => self.encode_gif(frames, frame_ms)?,
            AnimationFormat::Mp4 => self.encode_mp4(frames, frame_ms)?,
        };
        debug!(frames = frames.len(), format = format.extension(), size = bytes.len(), "Encoded animation");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifDecoder;
    use image::{AnimationDecoder, Rgba};

    #[test]
    fn test_format_from_extension() {
        assert_eq!(AnimationFormat::from_path(Path::new("a/b.gif")).unwrap(), AnimationFormat::Gif);
        assert_eq!(AnimationFormat::from_path(Path::new("b.MP4")).unwrap(), AnimationFormat::Mp4);
        assert!(matches!(
            AnimationFormat::from_path(Path::new("b.webm")),
            Err(RenderError::UnsupportedFormat(_))
        ));
        assert!(AnimationFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_gif_has_every_frame() {
        let frames: Vec<RgbaImage> = (0..5u8)
            .map(|i| RgbaImage::from_pixel(8, 8, Rgba([i * 40, 0, 0, 255])))
            .collect();
        let bytes = FrameAnimator::default()
            .encode(&frames, AnimationFormat::Gif, 100)
            .unwrap();
        assert_eq!(&bytes[..6], b"GIF89a");

        let decoded = GifDecoder::new(Cursor::new(bytes))
            .unwrap()
            .into_frames()
            .collect_frames()
            .unwrap();
        assert_eq!(decoded.len(), 5);
        let (num, den) = decoded[0].delay().numer_denom_ms();
        assert_eq!(num / den, 100);
    }

    #[test]
    fn test_empty_frames_rejected() {
        assert!(FrameAnimator::default()
            .encode(&[], AnimationFormat::Gif, 100)
            .is_err());
    }

    #[test]
    fn test_missing_ffmpeg_is_encoder_error() {
        let frames = vec![RgbaImage::new(4, 4)];
        let err = FrameAnimator::new("/nonexistent/ffmpeg")
            .encode(&frames, AnimationFormat::Mp4, 100)
            .unwrap_err();
        assert!(matches!(err, RenderError::Encoder(_)));
    }
}

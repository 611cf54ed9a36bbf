//! Stub decoder, renderer and encoder for driving the pipeline without
//! netCDF files, fonts or ffmpeg.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use image::{Rgba, RgbaImage};
use pipeline::{DecodedRaster, PipelineError, PipelineResult, RasterDecoder, RawArtifact};
use projection::SourceGeometry;
use renderer::{
    encode_png, AnimationEncoder, AnimationFormat, FrameRenderer, FrameStyle, Overlays,
    RasterFrame, RenderResult,
};

/// Returns the same raster for every artifact, failing for chosen names.
pub struct StubDecoder {
    geometry: SourceGeometry,
    values: Vec<f32>,
    failing: Mutex<HashSet<String>>,
    calls: AtomicUsize,
}

impl StubDecoder {
    pub fn new(geometry: SourceGeometry, values: Vec<f32>) -> Self {
        Self {
            geometry,
            values,
            failing: Mutex::new(HashSet::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Make decoding of `name` fail until [`StubDecoder::heal`] is called.
    pub fn fail_on(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    pub fn heal(&self, name: &str) {
        self.failing.lock().unwrap().remove(name);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RasterDecoder for StubDecoder {
    fn decode(&self, artifact: &RawArtifact) -> PipelineResult<DecodedRaster> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&artifact.name) {
            return Err(PipelineError::decode(&artifact.path, "stub decode failure"));
        }
        Ok(DecodedRaster {
            geometry: self.geometry.clone(),
            values: self.values.clone(),
            caption: vec![artifact.name.clone()],
        })
    }
}

/// Writes a grey PNG the size of the frame's grid.
#[derive(Default)]
pub struct StubRenderer {
    calls: AtomicUsize,
}

impl StubRenderer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FrameRenderer for StubRenderer {
    fn render_frame(
        &self,
        frame: &RasterFrame,
        _overlays: &Overlays,
        _style: &FrameStyle,
    ) -> RenderResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (w, h) = frame.grid.dimensions();
        let img = RgbaImage::from_pixel(w as u32, h as u32, Rgba([128, 128, 128, 255]));
        encode_png(&img)
    }
}

/// Records the frame count of every encode call.
#[derive(Default)]
pub struct RecordingEncoder {
    pub encoded: Mutex<Vec<(AnimationFormat, usize, u32)>>,
}

impl RecordingEncoder {
    pub fn frame_counts(&self) -> Vec<usize> {
        self.encoded.lock().unwrap().iter().map(|(_, n, _)| *n).collect()
    }
}

impl AnimationEncoder for RecordingEncoder {
    fn encode(
        &self,
        frames: &[RgbaImage],
        format: AnimationFormat,
        frame_ms: u32,
    ) -> RenderResult<Vec<u8>> {
        self.encoded
            .lock()
            .unwrap()
            .push((format, frames.len(), frame_ms));
        Ok(format!("{}:{}", format.extension(), frames.len()).into_bytes())
    }
}

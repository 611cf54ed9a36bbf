//! Assembly of recent frames into a looping animation.

use std::path::Path;

use chrono::{DateTime, Utc};
use image::RgbaImage;
use loop_common::{age, duration_from_hours};
use renderer::{AnimationEncoder, AnimationFormat};
use tracing::{info, instrument, warn};

use crate::atomic::write_atomic;
use crate::error::PipelineResult;
use crate::product::RenderedArtifact;

/// Extra copies of the newest frame so viewers pause on it before looping.
pub const HOLD_FRAMES: usize = 13;
pub const FRAME_MS: u32 = 100;
/// Fewer qualifying frames than this produce no animation.
pub const MIN_FRAMES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationOutcome {
    /// Total frames written, including the held copies
    Written { frames: usize },
    InsufficientFrames { available: usize },
}

/// Encode frames younger than `window_hours` (oldest first) into `output`.
/// The format follows the extension of `output`.
#[instrument(skip(ordered, output, encoder), fields(candidates = ordered.len(), output = %output.display()))]
pub fn assemble(
    ordered: &[RenderedArtifact],
    now: DateTime<Utc>,
    window_hours: f64,
    output: &Path,
    encoder: &dyn AnimationEncoder,
) -> PipelineResult<AnimationOutcome> {
    let format = AnimationFormat::from_path(output)?;
    let window = duration_from_hours(window_hours);

    let selected: Vec<&RenderedArtifact> = ordered
        .iter()
        .filter(|a| age(&a.timestamp, &now) <= window)
        .collect();
    if selected.len() < MIN_FRAMES {
        info!(available = selected.len(), "Not enough recent frames to animate");
        return Ok(AnimationOutcome::InsufficientFrames {
            available: selected.len(),
        });
    }

    let mut frames: Vec<RgbaImage> = Vec::with_capacity(selected.len() + HOLD_FRAMES);
    for artifact in &selected {
        match image::open(&artifact.path) {
            Ok(img) => frames.push(img.to_rgba8()),
            Err(e) => warn!(frame = %artifact.path.display(), error = %e, "Unreadable frame left out of animation"),
        }
    }
    if frames.len() < MIN_FRAMES {
        info!(available = frames.len(), "Not enough readable frames to animate");
        return Ok(AnimationOutcome::InsufficientFrames {
            available: frames.len(),
        });
    }
    let Some(last) = frames.last().cloned() else {
        return Ok(AnimationOutcome::InsufficientFrames { available: 0 });
    };
    frames.extend(std::iter::repeat(last).take(HOLD_FRAMES));

    let bytes = encoder.encode(&frames, format, FRAME_MS)?;
    write_atomic(output, &bytes)?;
    info!(frames = frames.len(), bytes = bytes.len(), "Wrote animation");
    Ok(AnimationOutcome::Written {
        frames: frames.len(),
    })
}

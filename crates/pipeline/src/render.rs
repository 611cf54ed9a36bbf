//! Idempotent rendering of raw artifacts into map frames.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use loop_common::{epoch_of, TargetGrid};
use metrics::counter;
use projection::apply_transform;
use renderer::{FrameRenderer, FrameStyle, Overlays, RasterFrame};
use tracing::{debug, info, instrument, warn};

use crate::atomic::write_atomic;
use crate::decode::RasterDecoder;
use crate::error::PipelineResult;
use crate::product::{rendered_name, RawArtifact};
use crate::transform_cache::TransformCache;

/// Everything needed to turn a raw artifact of one stream into a frame.
pub struct RenderContext {
    pub decoder: Arc<dyn RasterDecoder>,
    pub renderer: Arc<dyn FrameRenderer>,
    pub overlays: Overlays,
    pub style: FrameStyle,
    pub grid: TargetGrid,
    pub render_dir: PathBuf,
}

impl RenderContext {
    /// Where the frame for `raw` is written.
    pub fn output_path(&self, raw: &RawArtifact) -> PathBuf {
        self.render_dir.join(rendered_name(&raw.name))
    }
}

/// Render every raw artifact without an existing frame (or all of them with
/// `force_regen`). Per-artifact failures are logged, invalidate the transform
/// cache and are retried on a later call. Returns the number of frames written.
#[instrument(skip_all, fields(raws = raws.len(), force_regen = force_regen))]
pub fn render_all(
    raws: &[RawArtifact],
    cache: &mut TransformCache,
    ctx: &RenderContext,
    force_regen: bool,
) -> usize {
    let mut rendered = 0;
    for raw in raws {
        let output = ctx.output_path(raw);
        if output.exists() && !force_regen {
            debug!(artifact = %raw.name, "Frame exists; skipping");
            continue;
        }

        match render_one(raw, cache, ctx, &output) {
            Ok(()) => {
                rendered += 1;
                counter!("sky_looper_renders_total").increment(1);
                info!(artifact = %raw.name, output = %output.display(), "Rendered frame");
            }
            Err(e) => {
                counter!("sky_looper_render_failures_total").increment(1);
                warn!(
                    artifact = %raw.name,
                    error = %e,
                    per_artifact = e.is_per_artifact(),
                    "Render failed; will retry next cycle"
                );
                cache.invalidate();
            }
        }
    }
    rendered
}

fn render_one(
    raw: &RawArtifact,
    cache: &mut TransformCache,
    ctx: &RenderContext,
    output: &Path,
) -> PipelineResult<()> {
    let decoded = ctx.decoder.decode(raw)?;
    let (coefficients, _) = cache.get_transform(&decoded.geometry, &ctx.grid, epoch_of(&raw.timestamp))?;
    let values = apply_transform(&coefficients, &decoded.values)?;

    let frame = RasterFrame::new(ctx.grid, values, decoded.caption)?;
    let png = ctx.renderer.render_frame(&frame, &ctx.overlays, &ctx.style)?;
    write_atomic(output, &png)?;
    Ok(())
}

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use pipeline::{render_all, rendered_name, RawArtifact, RenderContext, TransformCache};
use renderer::{Colormap, FrameStyle, Overlays};
use test_utils::{
    artifact_at, names_in, radar_local_name, site_grid, synthetic_radar, StreamDirs, StubDecoder,
    StubRenderer,
};

struct Fixture {
    dirs: StreamDirs,
    decoder: Arc<StubDecoder>,
    renderer: Arc<StubRenderer>,
    ctx: RenderContext,
    raws: Vec<RawArtifact>,
}

fn fixture() -> Fixture {
    let dirs = StreamDirs::new();
    let (geometry, values) = synthetic_radar();
    let decoder = Arc::new(StubDecoder::new(geometry, values));
    let renderer = Arc::new(StubRenderer::default());

    let ctx = RenderContext {
        decoder: decoder.clone(),
        renderer: renderer.clone(),
        overlays: Overlays::default(),
        style: FrameStyle::new(Colormap::nws_reflectivity()),
        grid: site_grid(0.3, 0.05),
        render_dir: dirs.render_dir(),
    };

    let raws = [(10, 0), (10, 6), (10, 12)]
        .iter()
        .map(|&(h, m)| {
            let ts = Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap();
            let name = radar_local_name("KFSX", ts);
            dirs.touch_raw(&name);
            artifact_at(&dirs.raw_dir(), &name, ts)
        })
        .collect();

    Fixture {
        dirs,
        decoder,
        renderer,
        ctx,
        raws,
    }
}

#[test]
fn test_second_pass_renders_nothing() {
    let f = fixture();
    let mut cache = TransformCache::default();

    assert_eq!(render_all(&f.raws, &mut cache, &f.ctx, false), 3);
    let expected: Vec<String> = f.raws.iter().map(|r| rendered_name(&r.name)).collect();
    assert_eq!(names_in(&f.dirs.render_dir()), expected);

    assert_eq!(render_all(&f.raws, &mut cache, &f.ctx, false), 0);
    assert_eq!(f.renderer.calls(), 3);
    assert_eq!(f.decoder.calls(), 3, "existing frames are not decoded again");
    assert_eq!(cache.builds(), 1, "one day, one geometry, one build");
}

#[test]
fn test_force_regen_renders_again() {
    let f = fixture();
    let mut cache = TransformCache::default();
    render_all(&f.raws, &mut cache, &f.ctx, false);
    assert_eq!(render_all(&f.raws, &mut cache, &f.ctx, true), 3);
    assert_eq!(cache.builds(), 1);
}

#[test]
fn test_failed_artifact_is_skipped_then_retried() {
    let f = fixture();
    let mut cache = TransformCache::default();
    f.decoder.fail_on(&f.raws[1].name);

    assert_eq!(render_all(&f.raws, &mut cache, &f.ctx, false), 2);
    assert!(!f.ctx.output_path(&f.raws[1]).exists());
    assert_eq!(cache.builds(), 2, "a failure invalidates the cached transform");

    f.decoder.heal(&f.raws[1].name);
    assert_eq!(render_all(&f.raws, &mut cache, &f.ctx, false), 1);
    assert!(f.ctx.output_path(&f.raws[1]).exists());
}

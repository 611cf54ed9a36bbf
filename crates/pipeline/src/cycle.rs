//! One poll cycle of a stream: acquire, render, reconcile, apply.

use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use loop_common::LoopError;
use metrics::histogram;
use storage::RemoteStore;
use tracing::{info, instrument, warn};

use crate::animate::{assemble, AnimationOutcome};
use crate::error::PipelineResult;
use crate::fetch::fetch_new;
use crate::planner::plan_queries;
use crate::publish::{publish, PublishReport};
use crate::render::render_all;
use crate::retention::{partition, purge, PurgeStats};
use crate::stream::{reconcile, StreamSettings, StreamSnapshot, StreamState};

const RENDERED_SUFFIX: &str = ".png";

/// What a cycle did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub stream: String,
    pub downloaded: usize,
    pub rendered: usize,
    pub purged_raw: PurgeStats,
    pub purged_rendered: PurgeStats,
    pub unparseable: usize,
    pub published: Option<PublishReport>,
    pub animations: Vec<(PathBuf, AnimationOutcome)>,
    pub elapsed_secs: f64,
}

/// Run a single cycle. Anticipated failures (remote errors, bad files,
/// undatable names) are handled inside; anything returned here is fatal.
#[instrument(skip_all, fields(stream = %settings.name, cycle = state.cycles + 1))]
pub async fn run_cycle(
    settings: &StreamSettings,
    state: &mut StreamState,
    store: &dyn RemoteStore,
    now: DateTime<Utc>,
) -> PipelineResult<CycleReport> {
    let started = Instant::now();
    let layout = &settings.layout;
    layout.create_all()?;
    let format = settings.product.timestamp_format().map_err(LoopError::from)?;

    let mut report = CycleReport {
        stream: settings.name.clone(),
        ..Default::default()
    };

    // acquire
    let queries = plan_queries(settings.lookback_hours, now, &settings.product);
    let fetched = fetch_new(
        store,
        &settings.product,
        &queries,
        &mut state.inventory,
        &layout.raw_dir(),
        settings.force_download,
    )
    .await;
    report.downloaded = fetched.len();

    // render everything current, so earlier failures are retried
    let raws = partition(
        &layout.raw_dir(),
        &format,
        &settings.product.raw_suffix(),
        now,
        settings.retention,
    )?;
    report.rendered = render_all(&raws.current, &mut state.cache, &settings.render, settings.force_regen);

    let rendered = partition(&layout.render_dir(), &format, RENDERED_SUFFIX, now, settings.retention)?;
    report.unparseable = raws.unparseable.len() + rendered.unparseable.len();
    if report.unparseable > 0 {
        warn!(count = report.unparseable, "Files with undatable names are being kept");
    }

    let plan = reconcile(StreamSnapshot {
        raws,
        rendered,
        rendered_this_cycle: report.rendered,
    });

    // apply
    report.purged_raw = purge(&plan.purge_raw);
    for artifact in &plan.purge_raw {
        state.inventory.remove(&artifact.name);
    }
    report.purged_rendered = purge(&plan.purge_rendered);

    if !plan.publish.is_empty() {
        report.published = Some(publish(
            &plan.publish,
            &layout.publish_dir(),
            &settings.publish.static_name,
            settings.publish.slot_count,
            settings.publish.stale_threshold,
            now,
            &settings.stamp,
        ));
    }

    if plan.animate {
        for output in settings.animation_paths() {
            match assemble(
                &plan.publish,
                now,
                settings.animation.window_hours,
                &output,
                settings.animator.as_ref(),
            ) {
                Ok(outcome) => report.animations.push((output, outcome)),
                Err(e) if e.is_per_artifact() => {
                    warn!(output = %output.display(), error = %e, "Animation failed");
                }
                Err(e) => return Err(e),
            }
        }
    }

    let elapsed = started.elapsed().as_secs_f64();
    report.elapsed_secs = elapsed;
    histogram!("sky_looper_cycle_seconds", "stream" => settings.name.clone()).record(elapsed);
    info!(
        downloaded = report.downloaded,
        rendered = report.rendered,
        purged = report.purged_raw.removed + report.purged_rendered.removed,
        elapsed_secs = elapsed,
        "Cycle complete"
    );

    state.cycles += 1;
    state.last_report = Some(report.clone());
    Ok(report)
}

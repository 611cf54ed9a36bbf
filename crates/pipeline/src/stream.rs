//! Per-stream settings, persistent state, and the post-render reconciliation rule.
//!
//! A stream is one product followed into one directory tree:
//!
//! ```text
//! <base>/raws/   downloaded source artifacts
//! <base>/pngs/   rendered frames
//! <base>/nows/   published slots, latest frame and animations
//! ```
//!
//! [`StreamState`] is everything that survives from one cycle to the next.
//! [`reconcile`] decides, without touching the filesystem, what the cycle
//! purges and republishes once rendering is done.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Duration;
use renderer::{AnimationEncoder, AnimationFormat, StaleStamp};
use storage::LocalInventory;

use crate::cycle::CycleReport;
use crate::error::{PipelineError, PipelineResult};
use crate::planner::MAX_LOOKBACK_HOURS;
use crate::product::{Artifact, ProductKey, RenderedArtifact};
use crate::render::RenderContext;
use crate::retention::{Partition, RetentionWindow};
use crate::transform_cache::TransformCache;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLayout {
    pub base_dir: PathBuf,
}

impl StreamLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.base_dir.join("raws")
    }

    pub fn render_dir(&self) -> PathBuf {
        self.base_dir.join("pngs")
    }

    pub fn publish_dir(&self) -> PathBuf {
        self.base_dir.join("nows")
    }

    pub fn create_all(&self) -> std::io::Result<()> {
        for dir in [self.raw_dir(), self.render_dir(), self.publish_dir()] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishSettings {
    pub static_name: String,
    pub slot_count: usize,
    pub stale_threshold: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationSettings {
    pub window_hours: f64,
    /// File names under the publish directory; format follows the extension
    pub outputs: Vec<String>,
}

/// Validated, immutable configuration of one stream.
pub struct StreamSettings {
    pub name: String,
    pub product: ProductKey,
    pub layout: StreamLayout,
    pub lookback_hours: f64,
    pub poll_interval: std::time::Duration,
    pub search_radius_m: f64,
    pub retention: RetentionWindow,
    pub publish: PublishSettings,
    pub animation: AnimationSettings,
    pub render: RenderContext,
    pub stamp: StaleStamp,
    pub animator: Arc<dyn AnimationEncoder>,
    pub force_download: bool,
    pub force_regen: bool,
}

impl StreamSettings {
    /// Check invariants the cycle relies on.
    pub fn validate(&self) -> PipelineResult<()> {
        let fail = |msg: String| -> PipelineResult<()> {
            Err(PipelineError::Settings(format!("{}: {}", self.name, msg)))
        };
        if self.publish.slot_count == 0 {
            return fail("slot_count must be at least 1".to_string());
        }
        if !(self.lookback_hours > 0.0 && self.lookback_hours <= MAX_LOOKBACK_HOURS) {
            return fail(format!(
                "lookback must be in (0, {}] hours, got {}",
                MAX_LOOKBACK_HOURS, self.lookback_hours
            ));
        }
        if !(self.search_radius_m > 0.0) {
            return fail(format!("search radius must be positive, got {}", self.search_radius_m));
        }
        if self.retention.max_age_hours < 0.0 || self.retention.fudge_hours < 0.0 {
            return fail("retention hours must not be negative".to_string());
        }
        if self.render.render_dir != self.layout.render_dir() {
            return fail(format!(
                "render directory {} is outside the stream layout",
                self.render.render_dir.display()
            ));
        }
        for output in &self.animation.outputs {
            AnimationFormat::from_path(Path::new(output))
                .map_err(|e| PipelineError::Settings(format!("{}: {}", self.name, e)))?;
        }
        Ok(())
    }

    pub fn animation_paths(&self) -> Vec<PathBuf> {
        let dir = self.layout.publish_dir();
        self.animation.outputs.iter().map(|o| dir.join(o)).collect()
    }
}

/// Mutable state carried across cycles of one stream.
#[derive(Debug)]
pub struct StreamState {
    pub cache: TransformCache,
    pub inventory: LocalInventory,
    pub cycles: u64,
    pub last_report: Option<CycleReport>,
}

impl StreamState {
    /// Create the stream directories and index the raws already on disk.
    pub fn open(settings: &StreamSettings) -> PipelineResult<Self> {
        settings.layout.create_all()?;
        let inventory = LocalInventory::scan(settings.layout.raw_dir())?;
        Ok(Self {
            cache: TransformCache::new(settings.search_radius_m),
            inventory,
            cycles: 0,
            last_report: None,
        })
    }
}

/// What the filesystem looks like after the render step of a cycle.
#[derive(Debug, Clone, Default)]
pub struct StreamSnapshot {
    pub raws: Partition,
    pub rendered: Partition,
    pub rendered_this_cycle: usize,
}

/// Side effects the cycle should apply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    pub purge_raw: Vec<Artifact>,
    pub purge_rendered: Vec<Artifact>,
    /// Current frames to publish, oldest first; empty means skip publication
    pub publish: Vec<RenderedArtifact>,
    pub animate: bool,
}

impl ReconcilePlan {
    pub fn is_noop(&self) -> bool {
        self.purge_raw.is_empty() && self.purge_rendered.is_empty() && self.publish.is_empty() && !self.animate
    }
}

/// Purge, publication and animation all wait for a cycle that produced at
/// least one new frame. Unparseable files are never scheduled for deletion.
pub fn reconcile(snapshot: StreamSnapshot) -> ReconcilePlan {
    if snapshot.rendered_this_cycle == 0 {
        return ReconcilePlan::default();
    }
    ReconcilePlan {
        purge_raw: snapshot.raws.expired,
        purge_rendered: snapshot.rendered.expired,
        animate: !snapshot.rendered.current.is_empty(),
        publish: snapshot.rendered.current,
    }
}

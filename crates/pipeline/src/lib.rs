//! Acquisition, reprojection and publication pipeline for sky-looper streams.
//!
//! A cycle of one stream runs:
//!
//! 1. [`planner`] picks the hourly listing prefixes to query
//! 2. [`fetch`] downloads objects not already on disk
//! 3. [`render`] decodes, reprojects (through the [`transform_cache`]) and
//!    draws every raw artifact that has no frame yet
//! 4. [`stream::reconcile`] decides what to purge and publish
//! 5. [`retention`], [`publish`] and [`animate`] apply that plan
//!
//! [`cycle::run_cycle`] sequences the steps; the looper service calls it on
//! each stream's poll interval.

pub mod animate;
pub mod atomic;
pub mod cycle;
pub mod decode;
pub mod error;
pub mod fetch;
pub mod planner;
pub mod product;
pub mod publish;
pub mod render;
pub mod retention;
pub mod stream;
pub mod transform_cache;

pub use animate::{assemble, AnimationOutcome};
pub use cycle::{run_cycle, CycleReport};
pub use decode::{quality_mask, CfRadialDecoder, DecodedRaster, GoesCmiDecoder, RasterDecoder};
pub use error::{PipelineError, PipelineResult};
pub use fetch::fetch_new;
pub use planner::{plan_queries, QueryPrefix, MAX_LOOKBACK_HOURS};
pub use product::{rendered_name, Artifact, ProductKey, RawArtifact, RenderedArtifact};
pub use publish::{latest_path, publish, slot_path, PublishReport};
pub use render::{render_all, RenderContext};
pub use retention::{partition, purge, Partition, PurgeStats, RetentionWindow};
pub use stream::{
    reconcile, AnimationSettings, PublishSettings, ReconcilePlan, StreamLayout, StreamSettings,
    StreamSnapshot, StreamState,
};
pub use transform_cache::{needs_rebuild, TransformCache, DEFAULT_SEARCH_RADIUS_M};

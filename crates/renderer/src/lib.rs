//! Frame rendering for sky-looper streams.
//!
//! Implements:
//! - Colormapping of reprojected rasters (gradient and discrete levels)
//! - Map overlays (GeoJSON boundaries/roads, site markers)
//! - Header captions and the stale-data stamp
//! - GIF/MP4 animation encoding

pub mod animation;
pub mod colormap;
pub mod error;
pub mod frame;
pub mod overlay;
pub mod stamp;
pub mod text;

pub use animation::{AnimationEncoder, AnimationFormat, FrameAnimator};
pub use colormap::{hex_to_rgb, ColorStop, Colormap};
pub use error::{RenderError, RenderResult};
pub use frame::{encode_png, FrameRenderer, FrameStyle, MapFrameRenderer, RasterFrame};
pub use overlay::{
    LineStyle, MarkerShape, OverlayLayer, Overlays, PropertyFilter, SiteMarker,
    DEFAULT_FILTER_RADIUS_DEG,
};
pub use stamp::StaleStamp;
pub use text::load_font;

//! Stream configuration loading.
//!
//! Loads one stream per YAML file from `config/streams/` and checks it once
//! at startup, producing the [`StreamSettings`] the pipeline runs on.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use loop_common::{duration_from_hours, LoopError, TargetGrid};
use pipeline::{
    AnimationSettings, CfRadialDecoder, GoesCmiDecoder, ProductKey, PublishSettings,
    RasterDecoder, RenderContext, RetentionWindow, StreamLayout, StreamSettings,
    DEFAULT_SEARCH_RADIUS_M,
};
use renderer::{
    load_font, Colormap, FrameAnimator, FrameStyle, LineStyle, MapFrameRenderer, OverlayLayer,
    Overlays, PropertyFilter, SiteMarker, StaleStamp, DEFAULT_FILTER_RADIUS_DEG,
};
use serde::Deserialize;
use storage::RemoteStoreConfig;
use tracing::{debug, info, warn};

/// Root configuration loaded from a stream YAML file.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    pub stream: StreamInfo,
    pub source: SourceConfig,
    /// Directory holding `raws/`, `pngs/` and `nows/`
    pub base_dir: PathBuf,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub animation: AnimationConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub force_download: bool,
    #[serde(default)]
    pub force_regen: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamInfo {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Goes,
    Nexrad,
}

/// Remote bucket and product selection.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Defaults to the public NOAA bucket for the kind
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_instrument")]
    pub instrument: String,
    #[serde(default = "default_channel")]
    pub channel: String,
    /// NEXRAD-specific: four-letter station id (e.g., "KFSX")
    #[serde(default)]
    pub station: Option<String>,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_instrument() -> String {
    "ABI-L2-CMIPC".to_string()
}

fn default_channel() -> String {
    "C13".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

/// Map center and extent.
#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    #[serde(default = "default_center_lon")]
    pub center_lon: f64,
    #[serde(default = "default_center_lat")]
    pub center_lat: f64,
    /// Statute miles from the center to the map edge
    #[serde(default = "default_radius_miles")]
    pub radius_miles: f64,
    #[serde(default = "default_resolution")]
    pub resolution_deg: f64,
    /// Farthest a target cell may be from its nearest source pixel
    #[serde(default = "default_search_radius")]
    pub search_radius_m: f64,
}

fn default_center_lon() -> f64 {
    -111.4223
}

fn default_center_lat() -> f64 {
    34.7443
}

fn default_radius_miles() -> f64 {
    200.0
}

fn default_resolution() -> f64 {
    0.005
}

fn default_search_radius() -> f64 {
    DEFAULT_SEARCH_RADIUS_M
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            center_lon: default_center_lon(),
            center_lat: default_center_lat(),
            radius_miles: default_radius_miles(),
            resolution_deg: default_resolution(),
            search_radius_m: default_search_radius(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_retention_hours")]
    pub hours: f64,
    #[serde(default = "default_fudge_hours")]
    pub fudge_hours: f64,
}

fn default_retention_hours() -> f64 {
    24.0
}

fn default_fudge_hours() -> f64 {
    1.0
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            hours: default_retention_hours(),
            fudge_hours: default_fudge_hours(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublishConfig {
    /// Slot file prefix; defaults to the stream name
    #[serde(default)]
    pub static_name: Option<String>,
    #[serde(default = "default_slot_count")]
    pub slot_count: usize,
    /// Defaults to 4 h for GOES and 3.25 h for NEXRAD
    #[serde(default)]
    pub stale_hours: Option<f64>,
}

fn default_slot_count() -> usize {
    48
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnimationConfig {
    #[serde(default = "default_window_hours")]
    pub window_hours: f64,
    /// Defaults to `<stream>_latest.gif`
    #[serde(default)]
    pub outputs: Vec<String>,
}

fn default_window_hours() -> f64 {
    4.0
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            window_hours: default_window_hours(),
            outputs: Vec::new(),
        }
    }
}

/// A GeoJSON line layer.
#[derive(Debug, Clone, Deserialize)]
pub struct OverlayConfig {
    pub name: String,
    pub path: PathBuf,
    pub color: String,
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    #[serde(default = "default_line_width")]
    pub width: u32,
    #[serde(default = "default_filter_radius")]
    pub radius_deg: f64,
    #[serde(default)]
    pub filter: Option<PropertyFilter>,
}

fn default_alpha() -> f32 {
    1.0
}

fn default_line_width() -> u32 {
    1
}

fn default_filter_radius() -> f64 {
    DEFAULT_FILTER_RADIUS_DEG
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    /// Defaults to `brightness_temperature` for GOES, `nws_reflectivity` for NEXRAD
    #[serde(default)]
    pub colormap: Option<String>,
    /// Rescale the colormap to `[min, max]`
    #[serde(default)]
    pub value_range: Option<[f32; 2]>,
    #[serde(default)]
    pub overlays: Vec<OverlayConfig>,
    /// Site markers; the Arizona observatories when absent
    #[serde(default)]
    pub sites: Option<Vec<SiteMarker>>,
    #[serde(default)]
    pub font_path: Option<PathBuf>,
    #[serde(default)]
    pub watermark_path: Option<PathBuf>,
    /// Stale stamp tint, 0-255
    #[serde(default)]
    pub stale_hue: u8,
    #[serde(default = "default_output_size")]
    pub output_size: Option<[u32; 2]>,
    /// Header strip height as a fraction of the image height
    #[serde(default)]
    pub header_fraction: Option<f32>,
    /// NEXRAD-specific: argv converting a Level II volume to CfRadial
    #[serde(default = "default_convert_command")]
    pub convert_command: Vec<String>,
    #[serde(default = "default_quality_control")]
    pub quality_control: bool,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,
}

fn default_output_size() -> Option<[u32; 2]> {
    Some([700, 700])
}

fn default_convert_command() -> Vec<String> {
    ["RadxConvert", "-f", "{input}", "-outdir", "{output_dir}", "-outname", "sweep.nc", "-cfradial"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_quality_control() -> bool {
    true
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            colormap: None,
            value_range: None,
            overlays: Vec::new(),
            sites: None,
            font_path: None,
            watermark_path: None,
            stale_hue: 0,
            output_size: default_output_size(),
            header_fraction: None,
            convert_command: default_convert_command(),
            quality_control: default_quality_control(),
            ffmpeg: default_ffmpeg(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleConfig {
    /// Defaults to 150 s for GOES and 90 s for NEXRAD
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    /// Defaults to the retention hours
    #[serde(default)]
    pub lookback_hours: Option<f64>,
}

impl StreamConfig {
    /// Load a stream configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: StreamConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        debug!(stream = %config.stream.name, path = %path.display(), "Loaded stream config");
        Ok(config)
    }

    pub fn product(&self) -> Result<ProductKey> {
        match self.source.kind {
            SourceKind::Goes => Ok(ProductKey::goes(&self.source.instrument, &self.source.channel)),
            SourceKind::Nexrad => match &self.source.station {
                Some(station) if station.len() == 4 => Ok(ProductKey::radar(station.to_uppercase())),
                Some(station) => bail!("station '{}' is not a four-letter id", station),
                None => bail!("nexrad streams need source.station"),
            },
        }
    }

    pub fn poll_interval(&self) -> Duration {
        let default = match self.source.kind {
            SourceKind::Goes => 150,
            SourceKind::Nexrad => 90,
        };
        Duration::from_secs(self.schedule.poll_interval_secs.unwrap_or(default))
    }

    pub fn stale_hours(&self) -> f64 {
        self.publish.stale_hours.unwrap_or(match self.source.kind {
            SourceKind::Goes => 4.0,
            SourceKind::Nexrad => 3.25,
        })
    }

    pub fn lookback_hours(&self) -> f64 {
        self.schedule.lookback_hours.unwrap_or(self.retention.hours)
    }

    pub fn static_name(&self) -> String {
        self.publish
            .static_name
            .clone()
            .unwrap_or_else(|| self.stream.name.clone())
    }

    pub fn animation_outputs(&self) -> Vec<String> {
        if self.animation.outputs.is_empty() {
            vec![format!("{}_latest.gif", self.stream.name)]
        } else {
            self.animation.outputs.clone()
        }
    }

    /// Bucket settings; credentials fall back to the AWS environment and
    /// requests go unsigned when there are none.
    pub fn remote_store_config(&self) -> RemoteStoreConfig {
        let bucket = self.source.bucket.clone().unwrap_or_else(|| {
            match self.source.kind {
                SourceKind::Goes => "noaa-goes16",
                SourceKind::Nexrad => "noaa-nexrad-level2",
            }
            .to_string()
        });
        RemoteStoreConfig {
            bucket,
            region: self.source.region.clone(),
            access_key_id: self
                .source
                .access_key_id
                .clone()
                .or_else(|| std::env::var("AWS_ACCESS_KEY_ID").ok()),
            secret_access_key: self
                .source
                .secret_access_key
                .clone()
                .or_else(|| std::env::var("AWS_SECRET_ACCESS_KEY").ok()),
            request_timeout: Duration::from_secs(self.source.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.source.connect_timeout_secs),
        }
    }

    /// Check every option and build the pipeline settings. Relative paths are
    /// resolved against `config_dir`.
    pub fn validate(&self, config_dir: &Path) -> Result<StreamSettings> {
        let name = &self.stream.name;
        let grid_cfg = &self.grid;
        if !(grid_cfg.center_lat.abs() <= 89.0) {
            return Err(LoopError::invalid_config(
                "grid.center_lat",
                format!("{} is outside +/-89 degrees", grid_cfg.center_lat),
            ))
            .with_context(|| format!("stream {}", name));
        }
        if !(grid_cfg.resolution_deg > 0.0) {
            return Err(LoopError::invalid_config(
                "grid.resolution_deg",
                format!("must be positive, got {}", grid_cfg.resolution_deg),
            ))
            .with_context(|| format!("stream {}", name));
        }
        let grid = TargetGrid::from_radius_miles(
            grid_cfg.center_lon,
            grid_cfg.center_lat,
            grid_cfg.radius_miles,
            grid_cfg.resolution_deg,
        )
        .with_context(|| format!("stream {}: grid", name))?;

        let product = self.product().with_context(|| format!("stream {}: source", name))?;
        let layout = StreamLayout::new(resolve(config_dir, &self.base_dir));

        let font = match &self.render.font_path {
            Some(path) => {
                let path = resolve(config_dir, path);
                Some(Arc::new(
                    load_font(&path).with_context(|| format!("stream {}: font", name))?,
                ))
            }
            None => {
                warn!(stream = %name, "No font configured; captions will be skipped");
                None
            }
        };

        let colormap = self.colormap().with_context(|| format!("stream {}", name))?;
        let mut style = FrameStyle::new(colormap)
            .with_font(font.clone())
            .with_output_size(self.render.output_size.map(|[w, h]| (w, h)));
        style.header_fraction = self.render.header_fraction.unwrap_or(match self.source.kind {
            SourceKind::Goes => 0.045,
            SourceKind::Nexrad => 0.06,
        });

        let overlays = self.overlays(config_dir).with_context(|| format!("stream {}", name))?;

        let watermark = self.render.watermark_path.as_ref().map(|p| resolve(config_dir, p));
        let stamp = StaleStamp::from_file(watermark.as_deref(), self.render.stale_hue, font)
            .with_context(|| format!("stream {}: watermark", name))?;

        let decoder: Arc<dyn RasterDecoder> = match &product {
            ProductKey::Geostationary { .. } => Arc::new(GoesCmiDecoder),
            ProductKey::Radar { station } => Arc::new(CfRadialDecoder::new(
                station.clone(),
                self.render.convert_command.clone(),
                self.render.quality_control,
            )),
        };

        let settings = StreamSettings {
            name: name.clone(),
            lookback_hours: self.lookback_hours(),
            poll_interval: self.poll_interval(),
            search_radius_m: grid_cfg.search_radius_m,
            retention: RetentionWindow::new(self.retention.hours, self.retention.fudge_hours),
            publish: PublishSettings {
                static_name: self.static_name(),
                slot_count: self.publish.slot_count,
                stale_threshold: duration_from_hours(self.stale_hours()),
            },
            animation: AnimationSettings {
                window_hours: self.animation.window_hours,
                outputs: self.animation_outputs(),
            },
            render: RenderContext {
                decoder,
                renderer: Arc::new(MapFrameRenderer),
                overlays,
                style,
                grid,
                render_dir: layout.render_dir(),
            },
            stamp,
            animator: Arc::new(FrameAnimator::new(self.render.ffmpeg.clone())),
            force_download: self.force_download,
            force_regen: self.force_regen,
            product,
            layout,
        };
        settings.validate()?;

        info!(
            stream = %name,
            product = %settings.product.label(),
            grid = ?settings.render.grid.dimensions(),
            poll_secs = settings.poll_interval.as_secs(),
            "Validated stream configuration"
        );
        Ok(settings)
    }

    fn colormap(&self) -> Result<Colormap> {
        let name = self.render.colormap.clone().unwrap_or_else(|| {
            match self.source.kind {
                SourceKind::Goes => "brightness_temperature",
                SourceKind::Nexrad => "nws_reflectivity",
            }
            .to_string()
        });
        let colormap = Colormap::by_name(&name)
            .ok_or_else(|| LoopError::invalid_config("render.colormap", format!("unknown colormap '{}'", name)))?;
        Ok(match self.render.value_range {
            Some([min, max]) if max > min => colormap.with_range(min, max),
            Some([min, max]) => {
                return Err(LoopError::invalid_config(
                    "render.value_range",
                    format!("[{}, {}] is empty", min, max),
                )
                .into())
            }
            None => colormap,
        })
    }

    fn overlays(&self, config_dir: &Path) -> Result<Overlays> {
        let center = (self.grid.center_lon, self.grid.center_lat);
        let mut layers = Vec::with_capacity(self.render.overlays.len());
        for overlay in &self.render.overlays {
            let mut style = LineStyle::from_hex(&overlay.color, overlay.alpha)
                .with_context(|| format!("overlay {}", overlay.name))?;
            style.width = overlay.width;
            let layer = OverlayLayer::load_geojson(
                &overlay.name,
                &resolve(config_dir, &overlay.path),
                style,
                center,
                overlay.radius_deg,
                overlay.filter.as_ref(),
            )
            .with_context(|| format!("overlay {}", overlay.name))?;
            if layer.is_empty() {
                warn!(overlay = %overlay.name, "Overlay has no features near the map center");
            }
            layers.push(layer);
        }
        let markers = self
            .render
            .sites
            .clone()
            .unwrap_or_else(SiteMarker::arizona_observatories);
        Ok(Overlays::new(layers, markers))
    }
}

fn resolve(config_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        config_dir.join(path)
    }
}

/// Load all enabled stream configurations from a directory.
pub fn load_stream_configs(config_dir: &Path) -> Result<Vec<StreamConfig>> {
    let streams_dir = config_dir.join("streams");

    if !streams_dir.exists() {
        warn!(path = %streams_dir.display(), "Streams config directory not found");
        return Ok(Vec::new());
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(&streams_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().map_or(false, |ext| ext == "yaml" || ext == "yml"))
        .collect();
    paths.sort();

    let mut configs = Vec::new();
    for path in paths {
        match StreamConfig::load(&path) {
            Ok(config) => {
                if config.stream.enabled {
                    info!(
                        stream = %config.stream.name,
                        kind = ?config.source.kind,
                        "Loaded stream configuration"
                    );
                    configs.push(config);
                } else {
                    debug!(stream = %config.stream.name, "Skipping disabled stream");
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load stream config");
            }
        }
    }

    info!(count = configs.len(), "Loaded stream configurations");
    Ok(configs)
}

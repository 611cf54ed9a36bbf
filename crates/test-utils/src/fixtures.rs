//! Stream directory fixtures and artifact name builders.
//!
//! Names follow the layouts the pipeline reads:
//! - GOES remote: `ABI-L2-CMIPC/2018/319/23/OR_ABI-L2-CMIPC-M6C13_G16_s..._e20183192334541_c....nc`
//! - GOES local: `20183192334541_C13.nc`, rendered `20183192334541_C13.png`
//! - Radar remote: `2019/05/17/KFSX/KFSX20190517_000556_V06`
//! - Radar local: `KFSX20190517_000556`, rendered `KFSX20190517_000556.png`

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use image::{Rgba, RgbaImage};
use loop_common::duration_from_hours;
use pipeline::{Artifact, StreamLayout};
use tempfile::TempDir;

/// A stream tree (`raws/`, `pngs/`, `nows/`) in a temporary directory.
pub struct StreamDirs {
    pub tmp: TempDir,
    pub layout: StreamLayout,
}

impl StreamDirs {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().expect("Failed to create temporary stream directory");
        let layout = StreamLayout::new(tmp.path().join("stream"));
        layout.create_all().expect("Failed to create stream directories");
        Self { tmp, layout }
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.layout.raw_dir()
    }

    pub fn render_dir(&self) -> PathBuf {
        self.layout.render_dir()
    }

    pub fn publish_dir(&self) -> PathBuf {
        self.layout.publish_dir()
    }

    /// Create a raw file with placeholder content.
    pub fn touch_raw(&self, name: &str) -> PathBuf {
        let path = self.raw_dir().join(name);
        std::fs::write(&path, b"raw").expect("Failed to write raw fixture");
        path
    }

    /// Create a small valid PNG in the render directory.
    pub fn write_rendered(&self, name: &str, rgb: [u8; 3]) -> PathBuf {
        let path = self.render_dir().join(name);
        write_png(&path, 8, 8, rgb);
        path
    }
}

impl Default for StreamDirs {
    fn default() -> Self {
        Self::new()
    }
}

/// Write a solid-color PNG.
pub fn write_png(path: &Path, width: u32, height: u32, rgb: [u8; 3]) {
    let img = RgbaImage::from_pixel(width, height, Rgba([rgb[0], rgb[1], rgb[2], 255]));
    img.save(path).expect("Failed to write PNG fixture");
}

/// Sorted file names in `dir`.
pub fn names_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

pub fn hours_before(now: DateTime<Utc>, hours: f64) -> DateTime<Utc> {
    now - duration_from_hours(hours)
}

/// An [`Artifact`] for `name` in `dir`, without touching the filesystem.
pub fn artifact_at(dir: &Path, name: &str, timestamp: DateTime<Utc>) -> Artifact {
    Artifact {
        name: name.to_string(),
        timestamp,
        path: dir.join(name),
    }
}

/// GOES scan-end field: seconds precision plus a tenths digit.
pub fn goes_scan_end(ts: DateTime<Utc>) -> String {
    format!("{}0", ts.format("%Y%j%H%M%S"))
}

pub fn goes_remote_key(instrument: &str, channel: &str, ts: DateTime<Utc>) -> String {
    let end = goes_scan_end(ts);
    format!(
        "{}/{}/OR_{}-M6{}_G16_s{}_e{}_c{}.nc",
        instrument,
        ts.format("%Y/%j/%H"),
        instrument,
        channel,
        end,
        end,
        end
    )
}

pub fn goes_local_name(channel: &str, ts: DateTime<Utc>) -> String {
    format!("{}_{}.nc", goes_scan_end(ts), channel)
}

pub fn goes_rendered_name(channel: &str, ts: DateTime<Utc>) -> String {
    format!("{}_{}.png", goes_scan_end(ts), channel)
}

pub fn radar_remote_key(station: &str, ts: DateTime<Utc>) -> String {
    format!(
        "{}/{}/{}{}_V06",
        ts.format("%Y/%m/%d"),
        station,
        station,
        ts.format("%Y%m%d_%H%M%S")
    )
}

pub fn radar_local_name(station: &str, ts: DateTime<Utc>) -> String {
    format!("{}{}", station, ts.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pipeline::ProductKey;

    #[test]
    fn test_builders_agree_with_product_naming() {
        let ts = Utc.with_ymd_and_hms(2018, 11, 15, 23, 34, 54).unwrap();
        let goes = ProductKey::goes("ABI-L2-CMIPC", "C13");
        assert_eq!(
            goes.local_name(&goes_remote_key("ABI-L2-CMIPC", "C13", ts)),
            Some(goes_local_name("C13", ts))
        );
        assert_eq!(goes_local_name("C13", ts), "20183192334540_C13.nc");

        let radar = ProductKey::radar("KFSX");
        assert_eq!(
            radar.local_name(&radar_remote_key("KFSX", ts)),
            Some(radar_local_name("KFSX", ts))
        );
    }

    #[test]
    fn test_stream_dirs_layout() {
        let dirs = StreamDirs::new();
        assert!(dirs.raw_dir().is_dir());
        assert!(dirs.render_dir().is_dir());
        assert!(dirs.publish_dir().is_dir());
        dirs.touch_raw("a.nc");
        assert_eq!(names_in(&dirs.raw_dir()), vec!["a.nc".to_string()]);
    }
}

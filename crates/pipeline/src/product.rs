//! Product identity: how remote objects are selected, named locally, and dated.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use loop_common::{TimeParseError, TimestampFormat};

/// Which remote product a stream follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductKey {
    /// GOES ABI L2 imagery, e.g. instrument `ABI-L2-CMIPC`, channel `C13`.
    Geostationary { instrument: String, channel: String },
    /// NEXRAD Level II volumes for one station, e.g. `KFSX`.
    Radar { station: String },
}

impl ProductKey {
    pub fn goes(instrument: impl Into<String>, channel: impl Into<String>) -> Self {
        ProductKey::Geostationary {
            instrument: instrument.into(),
            channel: channel.into(),
        }
    }

    pub fn radar(station: impl Into<String>) -> Self {
        ProductKey::Radar {
            station: station.into(),
        }
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> String {
        match self {
            ProductKey::Geostationary {
                instrument,
                channel,
            } => format!("{}-{}", instrument, channel),
            ProductKey::Radar { station } => station.clone(),
        }
    }

    /// Listing prefix covering the hour that contains `hour`.
    pub fn prefix_for(&self, hour: &DateTime<Utc>) -> String {
        match self {
            ProductKey::Geostationary { instrument, .. } => {
                format!("{}/{}/", instrument, hour.format("%Y/%j/%H"))
            }
            ProductKey::Radar { station } => format!("{}/{}", hour.format("%Y/%m/%d"), station),
        }
    }

    /// Canonical local file name for a remote key, or None if the key is not
    /// part of this product.
    pub fn local_name(&self, key: &str) -> Option<String> {
        let base = key.rsplit('/').next().unwrap_or(key);
        let fields: Vec<&str> = base.split('_').collect();

        match self {
            ProductKey::Geostationary {
                instrument,
                channel,
            } => {
                if !base.starts_with(&format!("OR_{}-M", instrument)) {
                    return None;
                }
                // OR_ABI-L2-CMIPC-M3C13_G16_s..._e20183192334541_c....nc
                let mode_channel = fields.get(1)?.split('-').nth(3)?;
                if !mode_channel.ends_with(channel.as_str()) {
                    return None;
                }
                let scan_end = fields.get(4)?.strip_prefix('e')?;
                if scan_end.is_empty() || !scan_end.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                Some(format!("{}_{}.nc", scan_end, channel))
            }
            ProductKey::Radar { station } => {
                if !base.starts_with(station.as_str()) || base.ends_with("_MDM") {
                    return None;
                }
                if fields.len() < 2 {
                    return None;
                }
                Some(format!("{}_{}", fields[0], fields[1]))
            }
        }
    }

    /// Timestamp layout at the start of raw (and rendered) file names.
    pub fn timestamp_format(&self) -> Result<TimestampFormat, TimeParseError> {
        match self {
            ProductKey::Geostationary { .. } => TimestampFormat::new("%Y%j%H%M%S"),
            ProductKey::Radar { station } => TimestampFormat::new(format!("{}%Y%m%d_%H%M%S", station)),
        }
    }

    /// Suffix every raw file of this product ends with (may be empty).
    pub fn raw_suffix(&self) -> String {
        match self {
            ProductKey::Geostationary { channel, .. } => format!("_{}.nc", channel),
            ProductKey::Radar { .. } => String::new(),
        }
    }
}

/// Rendered file name for a raw file name: the raw stem plus `.png`.
pub fn rendered_name(raw_name: &str) -> String {
    let stem = Path::new(raw_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| raw_name.to_string());
    format!("{}.png", stem)
}

/// A file on disk whose name carries its acquisition time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub path: PathBuf,
}

impl Artifact {
    /// Date `path` by its file name.
    pub fn from_path(path: PathBuf, format: &TimestampFormat) -> Result<Self, TimeParseError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let timestamp = format.parse(&name)?;
        Ok(Self {
            name,
            timestamp,
            path,
        })
    }
}

/// A downloaded source file.
pub type RawArtifact = Artifact;

/// A rendered frame derived 1:1 from a raw artifact.
pub type RenderedArtifact = Artifact;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const GOES_KEY: &str = "ABI-L2-CMIPC/2018/319/23/OR_ABI-L2-CMIPC-M3C13_G16_s20183192332157_e20183192334541_c20183192334596.nc";

    #[test]
    fn test_goes_local_name() {
        let p = ProductKey::goes("ABI-L2-CMIPC", "C13");
        assert_eq!(p.local_name(GOES_KEY).as_deref(), Some("20183192334541_C13.nc"));

        let other_band = GOES_KEY.replace("M3C13", "M3C01");
        assert_eq!(p.local_name(&other_band), None);
        assert_eq!(p.local_name("ABI-L2-CMIPC/2018/319/23/README"), None);
        // band 13 must not match band 3
        let p3 = ProductKey::goes("ABI-L2-CMIPC", "C3");
        assert_eq!(p3.local_name(GOES_KEY), None);
        let m6 = GOES_KEY.replace("M3C13", "M6C13");
        assert!(p.local_name(&m6).is_some());
    }

    #[test]
    fn test_radar_local_name() {
        let p = ProductKey::radar("KFSX");
        assert_eq!(
            p.local_name("2019/05/17/KFSX/KFSX20190517_000556_V06").as_deref(),
            Some("KFSX20190517_000556")
        );
        assert_eq!(
            p.local_name("2010/01/01/KFSX/KFSX20100101_000000_V03.gz").as_deref(),
            Some("KFSX20100101_000000")
        );
        assert_eq!(p.local_name("2019/05/17/KFSX/KFSX20190517_000556_V06_MDM"), None);
        assert_eq!(p.local_name("2019/05/17/KFSX/KFSX20190517_000556_MDM"), None);
        assert_eq!(p.local_name("2019/05/17/KICX/KICX20190517_000556_V06"), None);
    }

    #[test]
    fn test_prefixes() {
        let hour = Utc.with_ymd_and_hms(2018, 11, 15, 7, 30, 0).unwrap();
        assert_eq!(
            ProductKey::goes("ABI-L2-CMIPC", "C13").prefix_for(&hour),
            "ABI-L2-CMIPC/2018/319/07/"
        );
        assert_eq!(ProductKey::radar("KFSX").prefix_for(&hour), "2018/11/15/KFSX");
    }

    #[test]
    fn test_timestamp_formats_parse_local_names() {
        let goes = ProductKey::goes("ABI-L2-CMIPC", "C13");
        let ts = goes.timestamp_format().unwrap().parse("20183192334541_C13.nc").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2018, 11, 15, 23, 34, 54).unwrap());

        let radar = ProductKey::radar("KFSX");
        let ts = radar.timestamp_format().unwrap().parse("KFSX20190517_000556.png").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2019, 5, 17, 0, 5, 56).unwrap());
    }

    #[test]
    fn test_rendered_name() {
        assert_eq!(rendered_name("20183192334541_C13.nc"), "20183192334541_C13.png");
        assert_eq!(rendered_name("KFSX20190517_000556"), "KFSX20190517_000556.png");
    }
}

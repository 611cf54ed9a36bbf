//! GOES-R ABI Level 2 Cloud and Moisture Imagery (CMI) files.
//!
//! The `CMI` variable holds packed brightness temperatures (bands 7-16) or
//! reflectance factors (bands 1-6) on the fixed grid described by the
//! `goes_imager_projection` variable and the packed `x`/`y` scan angles.

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use projection::Geostationary;
use tracing::{debug, instrument};

use crate::error::{NetCdfError, NetCdfResult};
use crate::ncdump::{NcDump, Packing};

/// Descriptive metadata used to caption rendered frames.
#[derive(Debug, Clone, PartialEq)]
pub struct CmiMetadata {
    pub band_id: Option<u8>,
    /// e.g. "G16"
    pub platform_id: String,
    /// e.g. "GOES-East"
    pub orbital_slot: String,
    pub title: String,
    pub time_coverage_end: Option<DateTime<Utc>>,
}

impl CmiMetadata {
    /// Two upper-cased caption lines: platform and product, then band and time.
    pub fn caption_lines(&self, fallback_time: DateTime<Utc>) -> Vec<String> {
        let line1 = format!("{} ({})  {}", self.orbital_slot, self.platform_id, self.title);
        let time = self
            .time_coverage_end
            .unwrap_or(fallback_time)
            .format("%Y-%m-%d  %H:%M:%SZ");
        let line2 = match self.band_id {
            Some(band) => format!("Band {:02}  {}", band, time),
            None => time.to_string(),
        };
        vec![line1.to_uppercase(), line2.to_uppercase()]
    }
}

/// A decoded CMI image in its native fixed-grid geometry.
#[derive(Debug, Clone)]
pub struct GoesCmi {
    pub geometry: Geostationary,
    /// Physical values, row-major from the north-west, NaN for fill
    pub values: Vec<f32>,
    pub metadata: CmiMetadata,
}

/// Read a CMI file with `ncdump`.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_goes_cmi(path: &Path) -> NetCdfResult<GoesCmi> {
    let dump = NcDump::run(path, &["CMI", "band_id"])?;
    goes_cmi_from_dump(&dump)
}

/// Build a [`GoesCmi`] from captured `ncdump -v CMI,band_id` output.
pub fn goes_cmi_from_dump(dump: &NcDump) -> NetCdfResult<GoesCmi> {
    let nx = dump.dimension("x")?;
    let ny = dump.dimension("y")?;

    let proj = "goes_imager_projection";
    let geometry = Geostationary::new(
        dump.attribute(Some(proj), "perspective_point_height")?,
        dump.attribute(Some(proj), "semi_major_axis")?,
        dump.attribute(Some(proj), "semi_minor_axis")?,
        dump.attribute(Some(proj), "longitude_of_projection_origin")?,
        dump.attribute(Some("x"), "add_offset")?,
        dump.attribute(Some("x"), "scale_factor")?,
        dump.attribute(Some("y"), "add_offset")?,
        dump.attribute(Some("y"), "scale_factor")?,
        nx,
        ny,
    )?;

    let packing = Packing::from_header(dump, "CMI");
    let values = packing.unpack_all(&dump.values("CMI")?);
    if values.len() != nx * ny {
        return Err(NetCdfError::InvalidFormat(format!(
            "CMI has {} values, expected {}x{}",
            values.len(),
            nx,
            ny
        )));
    }

    let band_id = dump
        .values("band_id")
        .ok()
        .and_then(|v| v.first().copied().flatten())
        .map(|b| b as u8);

    let metadata = CmiMetadata {
        band_id,
        platform_id: dump.string_attribute(None, "platform_ID").unwrap_or_default(),
        orbital_slot: dump.string_attribute(None, "orbital_slot").unwrap_or_default(),
        title: dump.string_attribute(None, "title").unwrap_or_default(),
        time_coverage_end: dump
            .string_attribute(None, "time_coverage_end")
            .ok()
            .and_then(|s| parse_coverage_time(&s)),
    };

    debug!(nx, ny, band = ?metadata.band_id, "Decoded CMI");
    Ok(GoesCmi {
        geometry,
        values,
        metadata,
    })
}

/// Parse `2018-11-15T23:34:54.1Z`.
fn parse_coverage_time(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s.trim_end_matches('Z'), "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|t| t.and_utc())
}

//! CfRadial (CF-1.x radial) sweep files, as written by radar format converters.
//!
//! Rays of all sweeps are stacked along the `time` dimension; the first
//! sweep spans `sweep_start_ray_index[0]..=sweep_end_ray_index[0]`. Moment
//! fields are `(time, range)` arrays with CF packing.

use std::collections::HashMap;
use std::path::Path;

use projection::PolarSweep;
use tracing::{debug, instrument};

use crate::error::{NetCdfError, NetCdfResult};
use crate::ncdump::{NcDump, Packing};

/// The lowest sweep of a volume with the requested moment fields.
#[derive(Debug, Clone)]
pub struct CfRadialSweep {
    pub geometry: PolarSweep,
    /// Unpacked moments by variable name, ray-major like `geometry`
    pub fields: HashMap<String, Vec<f32>>,
    pub instrument_name: Option<String>,
}

impl CfRadialSweep {
    pub fn field(&self, name: &str) -> Option<&[f32]> {
        self.fields.get(name).map(Vec::as_slice)
    }
}

const GEOMETRY_VARIABLES: [&str; 5] = [
    "latitude",
    "longitude",
    "azimuth",
    "range",
    "sweep_start_ray_index",
];

/// Read the first sweep of a CfRadial file. Fields in `wanted` that the file
/// does not contain are skipped.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_cfradial_sweep(path: &Path, wanted: &[&str]) -> NetCdfResult<CfRadialSweep> {
    let header = NcDump::run(path, &[])?;
    let present: Vec<&str> = wanted
        .iter()
        .copied()
        .filter(|name| header.has_variable(name))
        .collect();

    let mut variables: Vec<&str> = GEOMETRY_VARIABLES.to_vec();
    variables.push("sweep_end_ray_index");
    variables.extend(&present);

    let dump = NcDump::run(path, &variables)?;
    cfradial_from_dump(&dump, &present)
}

/// Build a [`CfRadialSweep`] from captured `ncdump -v` output.
pub fn cfradial_from_dump(dump: &NcDump, fields: &[&str]) -> NetCdfResult<CfRadialSweep> {
    let first_value = |name: &str| -> NetCdfResult<f64> {
        dump.values(name)?
            .into_iter()
            .flatten()
            .next()
            .ok_or_else(|| NetCdfError::MissingData(format!("{} has no values", name)))
    };

    let site_lat = first_value("latitude")?;
    let site_lon = first_value("longitude")?;
    let start = first_value("sweep_start_ray_index")? as usize;
    let end = first_value("sweep_end_ray_index")? as usize;

    let total_rays = dump.dimension("time")?;
    let gate_count = dump.dimension("range")?;
    if end < start || end >= total_rays {
        return Err(NetCdfError::InvalidFormat(format!(
            "sweep rays {}..={} outside {} rays",
            start, end, total_rays
        )));
    }

    let all_azimuths = dump.values("azimuth")?;
    if all_azimuths.len() != total_rays {
        return Err(NetCdfError::InvalidFormat(format!(
            "azimuth has {} values for {} rays",
            all_azimuths.len(),
            total_rays
        )));
    }
    let azimuths: Vec<f32> = all_azimuths[start..=end]
        .iter()
        .map(|a| a.map(|v| v as f32).unwrap_or(f32::NAN))
        .collect();

    let ranges: Vec<f64> = dump.values("range")?.into_iter().flatten().collect();
    if ranges.len() != gate_count || gate_count < 2 {
        return Err(NetCdfError::InvalidFormat(format!(
            "range has {} values for {} gates",
            ranges.len(),
            gate_count
        )));
    }
    let gate_spacing_m = dump
        .attribute(Some("range"), "meters_between_gates")
        .unwrap_or(ranges[1] - ranges[0]);

    let geometry = PolarSweep {
        site_lon,
        site_lat,
        azimuths,
        first_gate_m: ranges[0],
        gate_spacing_m,
        gate_count,
    };
    geometry.validate()?;

    let mut moments = HashMap::new();
    for &name in fields {
        let raw = dump.values(name)?;
        if raw.len() != total_rays * gate_count {
            return Err(NetCdfError::InvalidFormat(format!(
                "{} has {} values, expected {}x{}",
                name,
                raw.len(),
                total_rays,
                gate_count
            )));
        }
        let packing = Packing::from_header(dump, name);
        let sweep = &raw[start * gate_count..(end + 1) * gate_count];
        moments.insert(name.to_string(), packing.unpack_all(sweep));
    }

    debug!(
        rays = geometry.ray_count(),
        gates = gate_count,
        fields = moments.len(),
        "Decoded CfRadial sweep"
    );
    Ok(CfRadialSweep {
        geometry,
        fields: moments,
        instrument_name: dump.string_attribute(None, "instrument_name").ok(),
    })
}

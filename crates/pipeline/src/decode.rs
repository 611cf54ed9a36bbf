//! Raw artifact decoders: turn a downloaded file into values on a source geometry.

use std::path::{Path, PathBuf};
use std::process::Command;

use netcdf_parser::{read_cfradial_sweep, read_goes_cmi};
use projection::SourceGeometry;
use tracing::{debug, instrument, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::product::RawArtifact;

/// Values of one artifact in its native geometry, plus header text.
#[derive(Debug, Clone)]
pub struct DecodedRaster {
    pub geometry: SourceGeometry,
    pub values: Vec<f32>,
    pub caption: Vec<String>,
}

/// Product-specific decoding of a raw artifact.
pub trait RasterDecoder: Send + Sync {
    fn decode(&self, artifact: &RawArtifact) -> PipelineResult<DecodedRaster>;
}

/// GOES ABI L2 CMI netCDF files.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoesCmiDecoder;

impl RasterDecoder for GoesCmiDecoder {
    #[instrument(skip_all, fields(artifact = %artifact.name))]
    fn decode(&self, artifact: &RawArtifact) -> PipelineResult<DecodedRaster> {
        let cmi = read_goes_cmi(&artifact.path).map_err(|e| PipelineError::decode(&artifact.path, e))?;
        let caption = cmi.metadata.caption_lines(artifact.timestamp);
        Ok(DecodedRaster {
            geometry: SourceGeometry::Geostationary(cmi.geometry),
            values: cmi.values,
            caption,
        })
    }
}

const REFLECTIVITY_FIELDS: [&str; 2] = ["REF", "DBZ"];
const ZDR_FIELD: &str = "ZDR";
const RHOHV_FIELD: &str = "RHOHV";

const MIN_REFLECTIVITY_DBZ: f32 = -40.0;
const MAX_ABS_ZDR_DB: f32 = 2.0;
const MIN_RHOHV: f32 = 0.90;

/// NEXRAD Level II volumes, converted to CfRadial by an external tool and
/// read as the lowest sweep.
#[derive(Debug, Clone)]
pub struct CfRadialDecoder {
    pub station: String,
    /// argv template with `{input}`, `{output}` and `{output_dir}`
    /// placeholders. Empty means the raw file is already CfRadial.
    pub convert_command: Vec<String>,
    pub quality_control: bool,
}

impl CfRadialDecoder {
    pub fn new(station: impl Into<String>, convert_command: Vec<String>, quality_control: bool) -> Self {
        Self {
            station: station.into(),
            convert_command,
            quality_control,
        }
    }

    /// Run the converter; returns the CfRadial file it produced.
    fn convert(&self, input: &Path, work_dir: &Path) -> PipelineResult<PathBuf> {
        let output = work_dir.join("sweep.nc");
        let args: Vec<String> = self
            .convert_command
            .iter()
            .map(|arg| {
                arg.replace("{input}", &input.to_string_lossy())
                    .replace("{output_dir}", &work_dir.to_string_lossy())
                    .replace("{output}", &output.to_string_lossy())
            })
            .collect();

        let (program, rest) = args
            .split_first()
            .ok_or_else(|| PipelineError::decode(input, "empty convert command"))?;
        debug!(program = %program, "Converting radar volume");

        let result = Command::new(program)
            .args(rest)
            .output()
            .map_err(|e| PipelineError::decode(input, format!("failed to run {}: {}", program, e)))?;
        if !result.status.success() {
            return Err(PipelineError::decode(
                input,
                format!(
                    "{} exited with {}: {}",
                    program,
                    result.status,
                    String::from_utf8_lossy(&result.stderr).trim()
                ),
            ));
        }

        if output.exists() {
            return Ok(output);
        }
        // converters given only an output directory pick their own file name
        let produced = std::fs::read_dir(work_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .find(|p| p.extension().map(|x| x == "nc").unwrap_or(false));
        produced.ok_or_else(|| PipelineError::decode(input, format!("{} produced no netCDF output", program)))
    }

    fn caption(&self, artifact: &RawArtifact) -> Vec<String> {
        let product = if self.quality_control {
            "FILTERED REFLECTIVITY"
        } else {
            "REFLECTIVITY"
        };
        vec![
            format!("{}  RADAR  {}", self.station.to_uppercase(), product),
            artifact.timestamp.format("%Y-%m-%d  %H:%M:%SZ").to_string(),
        ]
    }
}

impl RasterDecoder for CfRadialDecoder {
    #[instrument(skip_all, fields(artifact = %artifact.name, station = %self.station))]
    fn decode(&self, artifact: &RawArtifact) -> PipelineResult<DecodedRaster> {
        let work = tempfile::TempDir::new()?;
        let source = if self.convert_command.is_empty() {
            artifact.path.clone()
        } else {
            self.convert(&artifact.path, work.path())?
        };

        let mut wanted: Vec<&str> = REFLECTIVITY_FIELDS.to_vec();
        if self.quality_control {
            wanted.extend([ZDR_FIELD, RHOHV_FIELD]);
        }
        let mut sweep =
            read_cfradial_sweep(&source, &wanted).map_err(|e| PipelineError::decode(&artifact.path, e))?;

        let mut values = REFLECTIVITY_FIELDS
            .iter()
            .find_map(|name| sweep.fields.remove(*name))
            .ok_or_else(|| PipelineError::decode(&artifact.path, "no reflectivity field"))?;

        if self.quality_control {
            let masked = quality_mask(
                &mut values,
                sweep.field(ZDR_FIELD),
                sweep.field(RHOHV_FIELD),
            );
            debug!(masked, "Applied dual-pol quality control");
        }

        Ok(DecodedRaster {
            geometry: SourceGeometry::PolarSweep(sweep.geometry),
            values,
            caption: self.caption(artifact),
        })
    }
}

/// Blank gates that look like clutter or non-meteorological echo. ZDR and
/// RHOHV tests apply only when those fields are present and the same length.
/// Returns the number of gates masked.
pub fn quality_mask(reflectivity: &mut [f32], zdr: Option<&[f32]>, rhohv: Option<&[f32]>) -> usize {
    let len = reflectivity.len();
    let zdr = zdr.filter(|z| z.len() == len);
    let rhohv = rhohv.filter(|r| r.len() == len);
    if zdr.is_none() || rhohv.is_none() {
        warn!("Dual-pol fields missing; masking on reflectivity only");
    }

    let mut masked = 0;
    for (i, value) in reflectivity.iter_mut().enumerate() {
        if value.is_nan() {
            continue;
        }
        let bad = *value < MIN_REFLECTIVITY_DBZ
            || zdr.map(|z| z[i].abs() > MAX_ABS_ZDR_DB).unwrap_or(false)
            || rhohv.map(|r| r[i] < MIN_RHOHV).unwrap_or(false);
        if bad {
            *value = f32::NAN;
            masked += 1;
        }
    }
    masked
}

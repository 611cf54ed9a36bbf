//! Reading NetCDF files through the `ncdump` command-line tool.
//!
//! `ncdump -h` gives the CDL header (dimensions, variables, attributes);
//! `ncdump -v a,b` appends a `data:` section with the listed variables.
//! Both are plain text, so everything here is line-oriented parsing of CDL.

use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::error::{NetCdfError, NetCdfResult};

/// Parsed `ncdump` output for one file.
#[derive(Debug, Clone)]
pub struct NcDump {
    text: String,
    /// Byte offset of the `data:` section, if any
    data_start: Option<usize>,
}

impl NcDump {
    /// Run `ncdump` on `path`. With no `variables` only the header is read.
    pub fn run(path: &Path, variables: &[&str]) -> NetCdfResult<Self> {
        let mut cmd = Command::new("ncdump");
        if variables.is_empty() {
            cmd.arg("-h");
        } else {
            cmd.arg("-v").arg(variables.join(",")).args(["-p", "9,17"]);
        }
        let output = cmd
            .arg(path)
            .output()
            .map_err(|e| NetCdfError::CommandError(format!("Failed to run ncdump: {}", e)))?;

        if !output.status.success() {
            return Err(NetCdfError::CommandError(format!(
                "ncdump failed on {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(path = %path.display(), bytes = text.len(), "Read ncdump output");
        Ok(Self::parse(text))
    }

    /// Wrap already captured CDL text.
    pub fn parse(text: String) -> Self {
        let data_start = text
            .match_indices("data:")
            .find(|(i, _)| *i == 0 || text.as_bytes()[i - 1] == b'\n')
            .map(|(i, _)| i);
        Self { text, data_start }
    }

    fn header(&self) -> &str {
        match self.data_start {
            Some(i) => &self.text[..i],
            None => &self.text,
        }
    }

    fn section(&self, name: &str) -> &str {
        let header = self.header();
        let Some(start) = header.find(name) else {
            return "";
        };
        let rest = &header[start + name.len()..];
        let end = ["dimensions:", "variables:", "// global attributes:"]
            .iter()
            .filter_map(|s| rest.find(s))
            .min()
            .unwrap_or(rest.len());
        &rest[..end]
    }

    /// Length of a dimension. Unlimited dimensions use their current size.
    pub fn dimension(&self, name: &str) -> NetCdfResult<usize> {
        let pattern = format!("{} = ", name);
        for line in self.section("dimensions:").lines() {
            let line = line.trim_start();
            let Some(value) = line.strip_prefix(&pattern) else {
                continue;
            };
            let number = if value.starts_with("UNLIMITED") {
                value
                    .split('(')
                    .nth(1)
                    .and_then(|s| s.split_whitespace().next())
                    .unwrap_or("")
            } else {
                value.trim_end_matches(';').trim()
            };
            return number
                .parse()
                .map_err(|_| NetCdfError::InvalidFormat(format!("dimension {} = '{}'", name, value)));
        }
        Err(NetCdfError::MissingData(format!("dimension {}", name)))
    }

    /// True when the header declares variable `name`.
    pub fn has_variable(&self, name: &str) -> bool {
        self.section("variables:").lines().any(|line| {
            let mut tokens = line.split_whitespace();
            let (Some(_ty), Some(decl)) = (tokens.next(), tokens.next()) else {
                return false;
            };
            !decl.contains(':') && decl.split('(').next() == Some(name)
        })
    }

    fn raw_attribute(&self, variable: Option<&str>, name: &str) -> Option<&str> {
        let pattern = format!("{}:{} = ", variable.unwrap_or(""), name);
        self.header().lines().find_map(|line| {
            line.trim_start()
                .strip_prefix(&pattern)
                .map(|v| v.trim_end().trim_end_matches(';').trim())
        })
    }

    /// First value of a numeric attribute. `variable = None` reads a global.
    pub fn attribute(&self, variable: Option<&str>, name: &str) -> NetCdfResult<f64> {
        let raw = self
            .raw_attribute(variable, name)
            .ok_or_else(|| missing_attribute(variable, name))?;
        let first = raw.split(',').next().unwrap_or("").trim();
        parse_number(first).ok_or_else(|| {
            NetCdfError::InvalidFormat(format!("attribute {}:{} = '{}'", variable.unwrap_or(""), name, raw))
        })
    }

    /// A string attribute with its quotes removed.
    pub fn string_attribute(&self, variable: Option<&str>, name: &str) -> NetCdfResult<String> {
        let raw = self
            .raw_attribute(variable, name)
            .ok_or_else(|| missing_attribute(variable, name))?;
        match (raw.find('"'), raw.rfind('"')) {
            (Some(a), Some(b)) if b > a => Ok(raw[a + 1..b].to_string()),
            _ => Err(NetCdfError::InvalidFormat(format!(
                "attribute {}:{} is not a string: {}",
                variable.unwrap_or(""),
                name,
                raw
            ))),
        }
    }

    /// Values of a variable from the data section; `_` (fill) becomes None.
    pub fn values(&self, name: &str) -> NetCdfResult<Vec<Option<f64>>> {
        let start = self
            .data_start
            .ok_or_else(|| NetCdfError::MissingData(format!("data section for {}", name)))?;
        let data = &self.text[start..];

        let pattern = format!("{} =", name);
        let mut offset = 0;
        let body_start = loop {
            let line_end = data[offset..].find('\n').map(|i| offset + i + 1).unwrap_or(data.len());
            let line = data[offset..line_end].trim_start();
            if line.starts_with(&pattern) {
                let eq = data[offset..line_end].find('=').unwrap_or(0);
                break offset + eq + 1;
            }
            if line_end >= data.len() {
                return Err(NetCdfError::MissingData(format!("variable {}", name)));
            }
            offset = line_end;
        };

        let body = &data[body_start..];
        let end = body
            .find(';')
            .ok_or_else(|| NetCdfError::InvalidFormat(format!("unterminated data for {}", name)))?;

        body[..end]
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| {
                if token == "_" {
                    Ok(None)
                } else {
                    parse_number(token).map(Some).ok_or_else(|| {
                        NetCdfError::InvalidFormat(format!("value '{}' in {}", token, name))
                    })
                }
            })
            .collect()
    }
}

fn missing_attribute(variable: Option<&str>, name: &str) -> NetCdfError {
    NetCdfError::MissingData(format!("attribute {}:{}", variable.unwrap_or(""), name))
}

/// Parse a CDL number, dropping a type suffix (`f`, `s`, `b`, `L`, `UL`, ...).
fn parse_number(token: &str) -> Option<f64> {
    let trimmed = token.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    trimmed.parse().ok().or_else(|| match trimmed {
        "NaN" | "nan" => Some(f64::NAN),
        _ => None,
    })
}

/// CF packing of a stored variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Packing {
    pub scale_factor: f64,
    pub add_offset: f64,
    pub fill_value: Option<f64>,
    /// Stored as signed shorts but meant as unsigned (`_Unsigned = "true"`)
    pub unsigned: bool,
}

impl Default for Packing {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            add_offset: 0.0,
            fill_value: None,
            unsigned: false,
        }
    }
}

impl Packing {
    pub fn from_header(dump: &NcDump, variable: &str) -> Self {
        Self {
            scale_factor: dump.attribute(Some(variable), "scale_factor").unwrap_or(1.0),
            add_offset: dump.attribute(Some(variable), "add_offset").unwrap_or(0.0),
            fill_value: dump.attribute(Some(variable), "_FillValue").ok(),
            unsigned: dump
                .string_attribute(Some(variable), "_Unsigned")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    /// Physical value of one stored value; fill and missing become NaN.
    pub fn unpack(&self, raw: Option<f64>) -> f32 {
        let Some(mut v) = raw else {
            return f32::NAN;
        };
        if self.fill_value == Some(v) {
            return f32::NAN;
        }
        if self.unsigned && v < 0.0 {
            v += 65536.0;
            if let Some(fill) = self.fill_value {
                if fill < 0.0 && fill + 65536.0 == v {
                    return f32::NAN;
                }
            }
        }
        (v * self.scale_factor + self.add_offset) as f32
    }

    pub fn unpack_all(&self, raw: &[Option<f64>]) -> Vec<f32> {
        raw.iter().map(|&v| self.unpack(v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CDL: &str = r#"netcdf sample {
dimensions:
	y = 2 ;
	x = 3 ;
	time = UNLIMITED ; // (4 currently)
variables:
	short CMI(y, x) ;
		CMI:_FillValue = -1s ;
		CMI:scale_factor = 0.5f ;
		CMI:add_offset = 100.f ;
		CMI:_Unsigned = "true" ;
	float x(x) ;
	int band_id(band) ;

// global attributes:
		:title = "ABI L2 Cloud and Moisture Imagery" ;
		:platform_ID = "G16" ;
		:valid_range = 0s, 4094s ;
data:

 CMI = 0, 2, _,
    -2, 4, 6 ;

 band_id = 13 ;
}
"#;

    fn dump() -> NcDump {
        NcDump::parse(CDL.to_string())
    }

    #[test]
    fn test_dimensions() {
        let d = dump();
        assert_eq!(d.dimension("x").unwrap(), 3);
        assert_eq!(d.dimension("time").unwrap(), 4);
        assert!(matches!(d.dimension("z"), Err(NetCdfError::MissingData(_))));
    }

    #[test]
    fn test_attributes() {
        let d = dump();
        assert_eq!(d.attribute(Some("CMI"), "scale_factor").unwrap(), 0.5);
        assert_eq!(d.attribute(Some("CMI"), "add_offset").unwrap(), 100.0);
        assert_eq!(d.attribute(Some("CMI"), "_FillValue").unwrap(), -1.0);
        assert_eq!(d.attribute(None, "valid_range").unwrap(), 0.0);
        assert_eq!(d.string_attribute(None, "platform_ID").unwrap(), "G16");
        assert!(d.string_attribute(None, "orbital_slot").is_err());
    }

    #[test]
    fn test_variables_declared() {
        let d = dump();
        assert!(d.has_variable("CMI"));
        assert!(d.has_variable("band_id"));
        assert!(!d.has_variable("REF"));
    }

    #[test]
    fn test_values_span_lines_and_fill() {
        let d = dump();
        let values = d.values("CMI").unwrap();
        assert_eq!(
            values,
            vec![Some(0.0), Some(2.0), None, Some(-2.0), Some(4.0), Some(6.0)]
        );
        assert_eq!(d.values("band_id").unwrap(), vec![Some(13.0)]);
        // `x` is a dimension name too; it must not match the header line
        assert!(d.values("x").is_err());
    }

    #[test]
    fn test_unsigned_unpacking() {
        let d = dump();
        let packing = Packing::from_header(&d, "CMI");
        assert!(packing.unsigned);
        let out = packing.unpack_all(&d.values("CMI").unwrap());
        assert_eq!(out[0], 100.0);
        assert_eq!(out[1], 101.0);
        assert!(out[2].is_nan());
        // -2 is 65534 unsigned
        assert_eq!(out[3], (65534.0 * 0.5 + 100.0) as f32);
        assert!(packing.unpack(Some(-1.0)).is_nan());
    }
}

//! NetCDF readers for the imagery sky-looper renders.
//!
//! Two products are supported:
//! - GOES-R ABI L2 CMI files (fixed-grid geostationary imagery)
//! - CfRadial sweep files (radar volumes after conversion from Level II)
//!
//! # Implementation Notes
//!
//! Files are read through the `ncdump` command-line tool (part of the
//! netCDF utilities), so no HDF5/netCDF C libraries need to be linked.
//! Parsing is split from invocation so the CDL handling is testable on
//! captured text.

pub mod cfradial;
pub mod error;
pub mod goes;
pub mod ncdump;

pub use cfradial::{cfradial_from_dump, read_cfradial_sweep, CfRadialSweep};
pub use error::{NetCdfError, NetCdfResult};
pub use goes::{goes_cmi_from_dump, read_goes_cmi, CmiMetadata, GoesCmi};
pub use ncdump::{NcDump, Packing};

//! Shared test utilities for the sky-looper workspace.
//!
//! This crate provides common testing infrastructure including:
//! - The workspace root, for tests that read shipped configuration
//! - Stream directory fixtures and artifact name builders
//! - Synthetic geostationary and radar rasters
//! - An in-memory remote bucket
//! - Stub decoders, renderers and encoders for pipeline tests
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{seed_keys, StreamDirs};
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;
pub mod remote;
pub mod stubs;

pub use fixtures::*;
pub use generators::*;
pub use paths::*;
pub use remote::*;
pub use stubs::*;

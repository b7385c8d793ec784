//! Parsing and validation of `cinder.toml` task configuration files.
//!
//! This crate reads the configuration file and produces a strongly-typed
//! [`CinderConfig`], then resolves it into [`CompileSettings`] with anchored
//! paths and the toolchain's `#import` policy applied.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str};
pub use resolve::{resolve_settings, CompileSettings};
pub use types::*;

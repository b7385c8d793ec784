//! Error types for `cinder.toml` loading and validation.

use std::path::PathBuf;

/// Errors that can occur when loading or validating a `cinder.toml` configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    IoError {
        /// Path of the configuration file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The TOML content is malformed or has the wrong shape.
    #[error("invalid cinder.toml: {0}")]
    ParseError(String),

    /// A required field is missing or empty.
    #[error("cinder.toml is missing required field `{0}`")]
    MissingField(String),

    /// A field is present but unusable.
    #[error("invalid value in cinder.toml: {0}")]
    ValidationError(String),
}

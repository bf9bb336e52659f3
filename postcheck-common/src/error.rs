//! Error types for the postcheck-common crate.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required configuration field is missing.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A configuration value is invalid.
    #[error("Invalid configuration for {field}: {reason}")]
    Invalid { field: String, reason: String },

    /// The configuration file could not be read.
    #[error("Failed to read config from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid RON.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// No configuration file exists at any of the searched locations.
    #[error("No configuration file found. Tried:\n{tried}")]
    NotFound { tried: String },
}

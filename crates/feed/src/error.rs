//! Error types for event feed configuration
//!
//! Feeds and readers never fail; only loading and validating
//! configuration can produce an [`Error`].

use std::path::Path;
use thiserror::Error;

/// Result type for event feed operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading or validating feed configuration
#[derive(Error, Debug)]
pub enum Error {
    /// Reading a configuration file failed
    #[error("Failed to read configuration from {}: {source}", path.display())]
    Io {
        /// Path of the file that could not be read
        path: Box<Path>,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration text is not valid TOML for a feed configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration parsed but holds an invalid value
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message describing the configuration problem
        message: String,
    },
}

impl Error {
    /// Create an I/O error for the given path
    #[must_use]
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

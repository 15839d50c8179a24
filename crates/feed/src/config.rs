//! Configuration for feeds and the tracing bridge
//!
//! ```toml
//! reader_capacity = 8
//! prune_on_add = true
//!
//! [layer]
//! target_prefix = "myapp"
//! min_level = "info"
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::Level;

/// Configuration for a [`Feed`](crate::Feed)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct FeedConfig {
    /// Number of reader references to allocate up front
    pub reader_capacity: usize,

    /// Remove dangling readers every time a new reader is added
    pub prune_on_add: bool,

    /// Settings for [`FeedLayer`](crate::FeedLayer)
    pub layer: LayerConfig,
}

/// Filtering settings for the tracing bridge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LayerConfig {
    /// Only capture events from this module path or below it (`app` matches
    /// `app::db` but not `apple`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_prefix: Option<String>,

    /// Least verbose level still captured (`error` .. `trace`)
    pub min_level: String,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            target_prefix: None,
            min_level: "trace".to_string(),
        }
    }
}

impl LayerConfig {
    /// Parse `min_level` into a tracing level.
    ///
    /// # Errors
    ///
    /// Returns an error if the level name is not recognized.
    pub fn level(&self) -> Result<Level> {
        self.min_level.parse::<Level>().map_err(|_| {
            Error::configuration(format!("unknown log level '{}'", self.min_level))
        })
    }
}

impl FeedConfig {
    /// Parse and validate a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML, contains unknown
    /// keys, or fails [`validate`](Self::validate).
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its contents are invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(
            target: "event_feed",
            path = %path.display(),
            reader_capacity = config.reader_capacity,
            prune_on_add = config.prune_on_add,
            "Loaded feed configuration"
        );
        Ok(config)
    }

    /// Check values that deserialization alone cannot.
    ///
    /// # Errors
    ///
    /// Returns an error if `layer.min_level` is not a level name or
    /// `layer.target_prefix` is empty.
    pub fn validate(&self) -> Result<()> {
        self.layer.level()?;
        if self
            .layer
            .target_prefix
            .as_deref()
            .is_some_and(str::is_empty)
        {
            return Err(Error::configuration(
                "layer.target_prefix must not be empty; omit it to capture all targets",
            ));
        }
        Ok(())
    }
}

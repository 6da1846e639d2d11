//! Ingestion Configuration
//!
//! Tunables shared by the parsers, the directory source and the resolver.
//! Stored as JSON; every field has a default so a partial file is valid.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reading the file failed
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The file is not valid configuration JSON
    #[error("Invalid configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// A field holds an unusable value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Settings for file ingestion and reference resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Character that opens a calculation marker line in result files
    pub marker_sentinel: char,

    /// Extra column aliases (file name -> canonical name), applied on top of
    /// the built-in ones
    pub channel_aliases: BTreeMap<String, String>,

    /// Result file extensions searched by the directory source, in priority order
    pub result_extensions: Vec<String>,

    /// Upper bound on project fetches a single resolve call runs at once
    pub max_concurrent_fetches: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            marker_sentinel: '$',
            channel_aliases: BTreeMap::new(),
            result_extensions: vec!["det".to_string(), "pou".to_string()],
            max_concurrent_fetches: 8,
        }
    }
}

impl IngestConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.marker_sentinel.is_whitespace() || self.marker_sentinel.is_ascii_digit() {
            return Err(ConfigError::InvalidValue {
                field: "marker_sentinel".to_string(),
                message: format!("'{}' cannot start a marker line", self.marker_sentinel),
            });
        }
        if self.max_concurrent_fetches == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_concurrent_fetches".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

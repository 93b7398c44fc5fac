//! Server settings.
//!
//! Settings are an explicit value handed to the server, built from an
//! optional TOML file with command-line flags layered on top.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid CORS origin '{0}'")]
    InvalidCorsOrigin(String),
}

/// HTTP boundary settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Interface to bind.
    pub host: String,
    pub port: u16,
    /// Origin allowed to call the API from a browser.
    pub cors_origin: String,
    /// Largest accepted request body, in bytes.
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_origin: "http://localhost:5173".to_string(),
            max_body_bytes: 32 * 1024 * 1024,
        }
    }
}

impl Settings {
    /// Loads settings from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Settings, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Settings::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Settings, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

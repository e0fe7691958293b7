//! Configuration file structures for the dev server.
//!
//! This module defines structures for TOML configuration files:
//! - [`ConfigFile`]: Top-level configuration file structure
//! - [`ServerConfigFile`]: Local HTTP server settings
//!
//! # Example
//!
//! ```toml
//! [server]
//! port = 4646
//!
//! [build]
//! compile_command = ["cargo", "build", "--release", "--target", "wasm32-unknown-unknown"]
//! artifact_dir = "target/wasm32-unknown-unknown/release"
//!
//! [engine]
//! timeout_ms = 30000
//!
//! [tunnel]
//! api_base = "https://api.cactive.cloud"
//! renew_interval_secs = 1500
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{BuildConfig, EngineConfig, TunnelConfig};

/// Top-level configuration file structure.
///
/// Every section is optional; an absent section falls back to its defaults,
/// so an empty (or missing) file yields a fully usable configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Local HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfigFile,

    /// Staging and toolchain configuration.
    #[serde(default)]
    pub build: BuildConfig,

    /// Wasm engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Tunnel control-plane configuration.
    #[serde(default)]
    pub tunnel: TunnelConfig,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigFileError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed as TOML.
    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        toml::from_str(content).map_err(|e| ConfigFileError::Parse {
            message: e.to_string(),
        })
    }

    /// Resolve the local port, honoring the `PORT` environment variable.
    ///
    /// An unparseable `PORT` value is ignored in favor of the configured
    /// port rather than failing startup.
    pub fn resolve_port(&self) -> u16 {
        std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.server.port)
    }
}

/// Local HTTP server configuration from the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfigFile {
    /// Port to bind the local server on.
    #[serde(default = "defaults::port")]
    pub port: u16,

    /// Request timeout in seconds.
    #[serde(default = "defaults::request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfigFile {
    fn default() -> Self {
        Self {
            port: defaults::port(),
            request_timeout_secs: defaults::request_timeout_secs(),
        }
    }
}

/// Errors from configuration file loading.
#[derive(Error, Debug)]
pub enum ConfigFileError {
    /// The file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// Path of the config file.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The file could not be parsed as TOML.
    #[error("Failed to parse config file: {message}")]
    Parse {
        /// Description of the parse failure.
        message: String,
    },
}

/// Default values for configuration file fields.
mod defaults {
    pub fn port() -> u16 {
        4646
    }

    pub fn request_timeout_secs() -> u64 {
        30
    }
}

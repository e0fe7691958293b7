//! Common types, errors, and configuration for funcdev.
//!
//! This crate provides shared functionality used across the funcdev workspace:
//! - Error types using `thiserror` for type-safe error handling
//! - Configuration structures for the dev server and its TOML config file
//! - The digest manifest describing a function project

pub mod config;
pub mod config_file;
pub mod digest;
pub mod error;

pub use config::{BuildConfig, EngineConfig, TunnelConfig};
pub use config_file::{ConfigFile, ConfigFileError, ServerConfigFile};
pub use digest::Digest;
pub use error::{DevServerError, TunnelError};

//! Configuration structures for the dev server.
//!
//! This module defines configuration options for the individual components:
//! - [`BuildConfig`]: Staging workspace and external toolchain settings
//! - [`EngineConfig`]: Wasmtime engine settings (timeouts)
//! - [`TunnelConfig`]: Control-plane endpoint and lease renewal period

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Staging workspace and toolchain configuration.
///
/// The compile and install commands are argv vectors executed with the
/// staging workspace as their working directory. The install command gets
/// the dependency name appended as its final argument, one invocation per
/// digest entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BuildConfig {
    /// Name of the staging directory created inside the functions directory.
    ///
    /// Kept hidden (dot-prefixed) so the file watcher never sees builds
    /// as source changes.
    #[serde(default = "defaults::staging_dir")]
    pub staging_dir: String,

    /// Directory (relative to the staging workspace) where the compiler
    /// places loadable output modules.
    #[serde(default = "defaults::artifact_dir")]
    pub artifact_dir: String,

    /// Full-workspace compile command.
    #[serde(default = "defaults::compile_command")]
    pub compile_command: Vec<String>,

    /// Per-dependency install command; the dependency name is appended.
    #[serde(default = "defaults::install_command")]
    pub install_command: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            staging_dir: defaults::staging_dir(),
            artifact_dir: defaults::artifact_dir(),
            compile_command: defaults::compile_command(),
            install_command: defaults::install_command(),
        }
    }
}

/// Wasmtime engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Per-invocation execution timeout in milliseconds.
    ///
    /// Enforced through epoch interruption; a handler past its deadline
    /// traps instead of hanging the request forever.
    #[serde(default = "defaults::timeout_ms")]
    pub timeout_ms: u64,

    /// Epoch ticker period in milliseconds.
    ///
    /// The deadline granularity: smaller values interrupt runaway guests
    /// sooner at the cost of more timer wakeups.
    #[serde(default = "defaults::epoch_tick_ms")]
    pub epoch_tick_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_ms: defaults::timeout_ms(),
            epoch_tick_ms: defaults::epoch_tick_ms(),
        }
    }
}

impl EngineConfig {
    /// Get the execution timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get the epoch ticker period as a [`Duration`].
    pub fn epoch_tick(&self) -> Duration {
        Duration::from_millis(self.epoch_tick_ms)
    }

    /// Deadline for a single invocation, in epoch ticks.
    ///
    /// Always at least one tick, so a zero timeout cannot trap a handler
    /// before it runs.
    pub fn deadline_ticks(&self) -> u64 {
        (self.timeout_ms / self.epoch_tick_ms.max(1)).max(1)
    }
}

/// Tunnel control-plane configuration.
///
/// The lease expiry observed from the control plane is roughly 30 minutes;
/// the default renewal period keeps a 5 minute safety margin.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TunnelConfig {
    /// Base URL of the control plane API.
    #[serde(default = "defaults::api_base")]
    pub api_base: String,

    /// Lease renewal period in seconds.
    #[serde(default = "defaults::renew_interval_secs")]
    pub renew_interval_secs: u64,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            api_base: defaults::api_base(),
            renew_interval_secs: defaults::renew_interval_secs(),
        }
    }
}

impl TunnelConfig {
    /// Override the control-plane base URL (used by tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Override the renewal period.
    pub fn with_renew_interval(mut self, secs: u64) -> Self {
        self.renew_interval_secs = secs;
        self
    }

    /// Get the renewal period as a [`Duration`].
    pub fn renew_interval(&self) -> Duration {
        Duration::from_secs(self.renew_interval_secs)
    }
}

/// Default values for configuration fields.
mod defaults {
    pub fn staging_dir() -> String {
        ".funcdev".to_string()
    }

    pub fn artifact_dir() -> String {
        "target/wasm32-unknown-unknown/release".to_string()
    }

    pub fn compile_command() -> Vec<String> {
        vec![
            "cargo".to_string(),
            "build".to_string(),
            "--release".to_string(),
            "--target".to_string(),
            "wasm32-unknown-unknown".to_string(),
        ]
    }

    pub fn install_command() -> Vec<String> {
        vec!["cargo".to_string(), "add".to_string()]
    }

    pub fn timeout_ms() -> u64 {
        30_000
    }

    pub fn epoch_tick_ms() -> u64 {
        100
    }

    pub fn api_base() -> String {
        "https://api.cactive.cloud".to_string()
    }

    pub fn renew_interval_secs() -> u64 {
        25 * 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_config_defaults() {
        let config = BuildConfig::default();
        assert_eq!(config.staging_dir, ".funcdev");
        assert_eq!(config.compile_command[0], "cargo");
        assert_eq!(config.install_command, vec!["cargo", "add"]);
    }

    #[test]
    fn test_engine_deadline_ticks() {
        let config = EngineConfig {
            timeout_ms: 30_000,
            epoch_tick_ms: 100,
        };
        assert_eq!(config.deadline_ticks(), 300);

        // Degenerate settings still yield a usable deadline
        let config = EngineConfig {
            timeout_ms: 0,
            epoch_tick_ms: 0,
        };
        assert_eq!(config.deadline_ticks(), 1);
    }

    #[test]
    fn test_tunnel_config_renewal_margin() {
        let config = TunnelConfig::default();
        // Renewal must fire comfortably inside the ~30 minute lease window
        assert!(config.renew_interval() < Duration::from_secs(30 * 60));
        assert_eq!(config.renew_interval_secs, 1500);
    }

    #[test]
    fn test_tunnel_config_builders() {
        let config = TunnelConfig::default()
            .with_api_base("http://127.0.0.1:9000")
            .with_renew_interval(1);
        assert_eq!(config.api_base, "http://127.0.0.1:9000");
        assert_eq!(config.renew_interval(), Duration::from_secs(1));
    }
}

//! Configuration data types for scenariopod.

use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoResult, PostMergeContext, PostMergeHook};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

use crate::readiness::DEFAULT_POLL_INTERVAL;

/// Scenario scheduling.
#[derive(Debug, Clone, PartialEq, Eq, SmartDefault, Deserialize, Serialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Scenarios run at once. `0` runs them one after another.
    #[default = 4]
    pub concurrency: usize,

    /// Cancel the whole run after this many seconds.
    pub timeout_secs: Option<u64>,
}

impl SuiteConfig {
    /// Worker count, with `0` meaning one worker.
    #[must_use]
    pub const fn workers(&self) -> usize {
        worker_count(self.concurrency)
    }

    /// The run timeout, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Workers for a requested concurrency; `0` means one.
pub(crate) const fn worker_count(concurrency: usize) -> usize {
    if concurrency == 0 { 1 } else { concurrency }
}

/// Readiness polling.
#[derive(Debug, Clone, PartialEq, Eq, SmartDefault, Deserialize, Serialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Milliseconds between readiness probes.
    #[default = 100]
    pub poll_interval_ms: u64,
}

impl ReadinessConfig {
    /// The probe interval. A zero interval falls back to the default.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        if self.poll_interval_ms == 0 {
            DEFAULT_POLL_INTERVAL
        } else {
            Duration::from_millis(self.poll_interval_ms)
        }
    }
}

/// Root harness configuration.
///
/// Layers, lowest to highest: defaults, configuration file, environment
/// variables, command-line arguments.
///
/// Configuration files are discovered in this order:
/// 1. Path given by `SCENARIOPOD_CONFIG_PATH`
/// 2. `.scenariopod.toml` in the current working directory
/// 3. `.scenariopod.toml` in the home directory
/// 4. `~/.config/scenariopod/config.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(
    prefix = "SCENARIOPOD",
    post_merge_hook,
    discovery(
        app_name = "scenariopod",
        env_var = "SCENARIOPOD_CONFIG_PATH",
        config_file_name = "config.toml",
        dotfile_name = ".scenariopod.toml",
        config_cli_long = "config",
        config_cli_visible = true,
    )
)]
pub struct HarnessConfig {
    /// The container engine socket path or URL.
    pub engine_socket: Option<String>,

    /// Scenario scheduling.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub suite: SuiteConfig,

    /// Readiness polling.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub readiness: ReadinessConfig,
}

impl PostMergeHook for HarnessConfig {
    fn post_merge(&mut self, _ctx: &PostMergeContext) -> OrthoResult<()> {
        if self
            .engine_socket
            .as_deref()
            .is_some_and(|socket| socket.trim().is_empty())
        {
            self.engine_socket = None;
        }
        Ok(())
    }
}

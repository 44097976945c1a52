//! Harness configuration.
//!
//! Values are merged by `ortho_config` from defaults, a configuration file,
//! `SCENARIOPOD_*` environment variables, and command-line flags, each
//! layer overriding the one before.
//!
//! The configuration file is expected at `~/.config/scenariopod/config.toml`
//! by default.
//!
//! # Example Configuration
//!
//! ```toml
//! engine_socket = "unix:///run/user/1000/podman/podman.sock"
//!
//! [suite]
//! concurrency = 2
//! timeout_secs = 600
//!
//! [readiness]
//! poll_interval_ms = 250
//! ```

mod cli;
mod loader;
mod types;


pub use cli::Cli;
pub use loader::{env_var_names, load_config, load_config_with_env};
pub use types::{HarnessConfig, ReadinessConfig, SuiteConfig};
pub(crate) use types::worker_count;

//! Command-line flags test binaries can accept.

use camino::Utf8PathBuf;
use clap::Parser;

/// Harness flags, usually flattened into a test binary's own parser.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "scenariopod")]
#[command(about = "Ephemeral containers for behavioural test suites")]
pub struct Cli {
    /// Path to configuration file.
    #[arg(long)]
    pub config: Option<Utf8PathBuf>,

    /// Container engine socket path or URL.
    #[arg(long)]
    pub engine_socket: Option<String>,

    /// Scenarios run at once; `0` runs them sequentially.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Cancel the run after this many seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

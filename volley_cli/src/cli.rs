//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

/// Held for the life of the process; dropping it flushes the file writer.
pub static FILE_GUARD: Mutex<Option<tracing_appender::non_blocking::WorkerGuard>> =
    Mutex::new(None);
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(
    name = "volley",
    version,
    about = "Send a latency-calibrated wave of requests centered on a target instant"
)]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "volley.toml")]
    pub config: PathBuf,

    /// Log as JSON lines and print results as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides logging.level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Per-run overrides of the `[schedule]` and `[calibration]` sections.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Target instant (RFC 3339, or YYYY-MM-DDTHH:MM:SS in schedule.utc_offset)
    #[arg(long, value_name = "TIME")]
    pub target: Option<String>,
    /// Number of requests in the wave
    #[arg(long, value_name = "N")]
    pub requests: Option<u32>,
    /// Spacing between consecutive sends
    #[arg(long, value_name = "MS")]
    pub stagger_ms: Option<u64>,
    /// Re-check interval while waiting for the send time
    #[arg(long, value_name = "MS")]
    pub poll_ms: Option<u64>,
    /// Latency probes sent before scheduling
    #[arg(long, value_name = "N")]
    pub probes: Option<u32>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Calibrate, probe, wait for the adjusted start and send one wave
    Run(RunArgs),
    /// Measure round-trip latency only
    Calibrate {
        /// Number of sequential probes (defaults to calibration.probes)
        #[arg(long, value_name = "N")]
        probes: Option<u32>,
    },
    /// Send a single test request and show the reply
    Probe,
    /// Validate config and templates, print the plan; sends nothing
    SelfCheck(RunArgs),
}

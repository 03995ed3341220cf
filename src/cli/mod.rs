//! Command-line interface for Pathweave.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

/// Pathweave - adaptive multi-path packet router
#[derive(Parser, Debug)]
#[command(
    name = "pathweave",
    author,
    version,
    about = "Adaptive multi-path packet router driven by live path telemetry",
    long_about = r#"
Pathweave routes every packet onto one of several egress paths using:

  - Per-path utilization, latency and congestion telemetry
  - Per-flow stickiness and priority classification
  - Weighted load balancing across near-equivalent paths
  - Packet trimming on congested paths
  - Inactivity-based failure detection with timed recovery

QUICK START:
  pathweave config --output pathweave.toml
  pathweave --config pathweave.toml run --trace arrivals.jsonl
"#
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a packet-arrival trace through the router
    Run(RunArgs),

    /// Show example configuration
    Config(ConfigArgs),

    /// Validate a configuration file
    Validate,
}

/// Run command arguments
#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON-lines trace of packet arrivals
    #[arg(short, long)]
    pub trace: PathBuf,

    /// Stop at this simulated time (e.g. "50ms"); defaults to the last arrival
    #[arg(short, long, value_parser = parse_duration)]
    pub until: Option<Duration>,

    /// Override the configured path count
    #[arg(short, long)]
    pub paths: Option<usize>,

    /// Override the load-balancing RNG seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Config command arguments
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Output path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(s).map_err(|e| e.to_string())
}

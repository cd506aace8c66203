//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Edge Fusion - camera + laser range finder acquisition and fusion
#[derive(Parser, Debug)]
#[command(
    name = "edge-fusion",
    author,
    version,
    about = "Camera + laser range finder fusion runtime",
    long_about = "Acquires frames from a camera and distances from a laser range finder,\n\
                  pairs them on a fixed cadence and emits fused records.\n\n\
                  Runs against mock devices unless a serial range finder is requested."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "EDGE_FUSION_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "EDGE_FUSION_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run acquisition and fusion
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults when omitted
    #[arg(short, long, env = "EDGE_FUSION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Use the serial range finder instead of the mock one
    #[arg(long)]
    pub serial: bool,

    /// Override the range finder serial port
    #[arg(long, env = "EDGE_FUSION_PORT")]
    pub port: Option<String>,

    /// Override the camera frame rate (Hz)
    #[arg(long)]
    pub fps: Option<f64>,

    /// Override the fusion tick rate (Hz)
    #[arg(long)]
    pub tick_rate: Option<f64>,

    /// Base distance reported by the mock range finder (meters)
    #[arg(long, default_value = "2.0")]
    pub mock_distance: f64,

    /// Maximum number of fused records to produce (0 = unlimited)
    #[arg(long, default_value = "0", env = "EDGE_FUSION_MAX_RECORDS")]
    pub max_records: u64,

    /// Run timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "EDGE_FUSION_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without starting devices
    #[arg(long)]
    pub dry_run: bool,

    /// Capacity of the record subscription channel
    #[arg(long, default_value = "100", env = "EDGE_FUSION_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Metrics server port, overrides the configuration (0 = disabled)
    #[arg(long, env = "EDGE_FUSION_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

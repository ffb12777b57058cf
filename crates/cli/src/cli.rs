//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Sigroute - signal-routed structured event dispatcher
#[derive(Parser, Debug)]
#[command(
    name = "sigroute",
    author,
    version,
    about = "Signal-routed structured event dispatcher",
    long_about = "Routes structured events to sinks by signal name.\n\n\
                  Loads a dispatch configuration, builds the sink and adapter \n\
                  stacks it describes, and emits events through the router."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SIGROUTE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "SIGROUTE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the dispatcher from configuration and emit events through it
    Emit(EmitArgs),

    /// Validate configuration file without building sinks
    Validate(ValidateArgs),

    /// Display the routing table
    Info(InfoArgs),
}

/// Arguments for the `emit` command
#[derive(Parser, Debug, Clone)]
pub struct EmitArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "sigroute.toml", env = "SIGROUTE_CONFIG")]
    pub config: PathBuf,

    /// Signal to emit on
    #[arg(short, long)]
    pub signal: String,

    /// Event message
    #[arg(short, long, default_value = "")]
    pub message: String,

    /// Event field as key=value; value type is inferred (int, float, bool, string)
    #[arg(short, long = "field", value_name = "KEY=VALUE")]
    pub fields: Vec<String>,

    /// Number of events to emit
    #[arg(short = 'n', long, default_value = "1", env = "SIGROUTE_COUNT")]
    pub count: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "SIGROUTE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "sigroute.toml", env = "SIGROUTE_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "sigroute.toml", env = "SIGROUTE_CONFIG")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show each sink's adapter stack
    #[arg(long)]
    pub adapters: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

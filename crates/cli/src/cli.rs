//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// recsync - multi-device synchronized recording coordinator
#[derive(Parser, Debug)]
#[command(
    name = "recsync",
    author,
    version,
    about = "Multi-device synchronized recording coordinator",
    long_about = "Drives a set of capture devices through a shared lifecycle \
                  (setup, warmup, start, stop, cleanup) under per-stage \
                  deadlines, records row-aligned CSV and binary artifacts, \
                  and validates finished recording trees offline."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "RECSYNC_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "RECSYNC_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a synchronized recording
    Record(RecordArgs),

    /// Validate session-structured recordings offline
    Verify(VerifyArgs),

    /// Validate a single flat recording offline
    Check(CheckArgs),
}

/// Arguments for the `record` command
#[derive(Parser, Debug, Clone)]
pub struct RecordArgs {
    /// Root directory for recording artifacts
    #[arg(long = "output_path", default_value = "./output/", env = "RECSYNC_OUTPUT_PATH")]
    pub output_path: PathBuf,

    /// Optional binary calibration blob for the gaze device
    #[arg(long = "calibration_path", env = "RECSYNC_CALIBRATION_PATH")]
    pub calibration_path: Option<PathBuf>,

    /// Recording duration in seconds
    #[arg(long = "record_duration", default_value = "5", env = "RECSYNC_RECORD_DURATION")]
    pub record_duration: u64,
}

/// Arguments for the `verify` command
#[derive(Parser, Debug, Clone)]
pub struct VerifyArgs {
    /// Root directory holding the session recordings
    #[arg(long = "output_path", default_value = "./output/", env = "RECSYNC_OUTPUT_PATH")]
    pub output_path: PathBuf,

    /// Directory for verification result CSVs
    #[arg(long = "verified_path", default_value = "./verified/", env = "RECSYNC_VERIFIED_PATH")]
    pub verified_path: PathBuf,
}

/// Arguments for the `check` command
#[derive(Parser, Debug, Clone)]
pub struct CheckArgs {
    /// Root directory holding the flat recording
    #[arg(long = "output_path", default_value = "./output/", env = "RECSYNC_OUTPUT_PATH")]
    pub output_path: PathBuf,

    /// Recording duration the CSVs are checked against
    #[arg(long = "record_duration", default_value = "5", env = "RECSYNC_RECORD_DURATION")]
    pub record_duration: u64,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

//! # recsync CLI
//!
//! Command-line entry point.
//!
//! Provides:
//! - recording orchestration with graceful shutdown
//! - offline verification of session trees
//! - flat single-recording checks

mod cli;
mod commands;

use clap::Parser;
use tracing::info;
use tracing_subscriber::Layer;

use cli::{Cli, Commands};
use commands::{run_check, run_record, run_verify};

/// Exit code for runtime errors, matching the recorder's contract.
const EXIT_RUNTIME_ERROR: i32 = -1;

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("[ERROR] main: failed to initialize logging: {e}");
        std::process::exit(EXIT_RUNTIME_ERROR);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "recsync starting");

    let exit_code = match &cli.command {
        Commands::Record(args) => run_record(args).await,
        Commands::Verify(args) => run_verify(args),
        Commands::Check(args) => run_check(args),
    };

    std::process::exit(exit_code);
}

/// Initialize logging based on CLI options
fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else {
        let default_level = match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    let fmt_layer = match cli.log_format {
        cli::LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .boxed(),
        cli::LogFormat::Pretty => fmt::layer().pretty().boxed(),
        cli::LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    Ok(())
}

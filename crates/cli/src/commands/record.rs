//! `record` command implementation.

use std::sync::Arc;
use std::time::Duration;

use contracts::RecorderConfig;
use observability::{NullProcessMetrics, SystemMonitor};
use tracing::{error, info, warn};

use crate::cli::RecordArgs;

use super::build_orchestrator;

/// Settle pause between warmup and start, letting streams stabilize.
const SETTLE_AFTER_WARMUP: Duration = Duration::from_secs(3);

/// How often the recording loop re-checks the stop flag.
const STOP_POLL: Duration = Duration::from_millis(100);

/// Execute the `record` command. Returns the process exit code.
pub async fn run_record(args: &RecordArgs) -> i32 {
    let config = RecorderConfig {
        output_path: args.output_path.clone(),
        verified_path: RecorderConfig::default().verified_path,
        calibration_path: args.calibration_path.clone(),
        record_duration: args.record_duration,
    };

    info!(
        output = %config.output_path.display(),
        duration_s = config.record_duration,
        "starting recording session"
    );

    // Host metrics log; its absence never blocks a recording.
    let system_monitor = match SystemMonitor::start(&config.output_path, Arc::new(NullProcessMetrics))
    {
        Ok(monitor) => Some(monitor),
        Err(e) => {
            warn!(error = %e, "system monitor unavailable");
            None
        }
    };

    let orchestrator = match build_orchestrator(&config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            error!(error = %e, "orchestrator construction failed");
            return -1;
        }
    };

    // Cooperative shutdown: SIGINT/SIGTERM flip the stop flag observed
    // by the countdown loop.
    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("shutdown signal received, stopping recording");
        let _ = stop_tx.send(true);
    });

    info!("initializing devices");
    if !orchestrator.execute_setup().await {
        error!("initialization failed");
        return teardown(&orchestrator, system_monitor, -1).await;
    }

    info!("preparing devices");
    if !orchestrator.execute_warmup().await {
        error!("preparation failed");
        return teardown(&orchestrator, system_monitor, -1).await;
    }
    tokio::time::sleep(SETTLE_AFTER_WARMUP).await;

    info!("starting recording");
    if !orchestrator.execute_start().await {
        error!("recording start failed");
        return teardown(&orchestrator, system_monitor, -1).await;
    }

    let interrupted = countdown(config.record_duration, stop_rx).await;
    if interrupted {
        info!("recording interrupted by signal");
    }

    info!("stopping recording");
    let code = teardown(&orchestrator, system_monitor, 0).await;

    info!("recording completed");
    code
}

/// Per-second countdown, interruptible within one stop-poll interval.
/// Returns whether the loop was interrupted.
async fn countdown(duration_s: u64, stop_rx: tokio::sync::watch::Receiver<bool>) -> bool {
    for remaining in (1..=duration_s).rev() {
        info!(remaining_s = remaining, "recording in progress");

        for _ in 0..10 {
            if *stop_rx.borrow() {
                return true;
            }
            tokio::time::sleep(STOP_POLL).await;
        }
    }

    *stop_rx.borrow()
}

/// Stop and clean up every manager, then close the system monitor.
async fn teardown(
    orchestrator: &orchestrator::Orchestrator,
    system_monitor: Option<SystemMonitor>,
    code: i32,
) -> i32 {
    orchestrator.execute_stop().await;
    orchestrator.execute_cleanup();

    if let Some(monitor) = system_monitor {
        monitor.stop();
    }

    code
}

/// Resolves when SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            error!("failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

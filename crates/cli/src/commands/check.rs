//! `check` command implementation.

use contracts::RecorderConfig;
use tracing::{error, info};

use crate::cli::CheckArgs;

use super::build_orchestrator;

/// Execute the `check` command against a flat recording. Returns the
/// process exit code: 0 on success, 1 when the check fails, -1 on
/// runtime errors.
pub fn run_check(args: &CheckArgs) -> i32 {
    let config = RecorderConfig {
        output_path: args.output_path.clone(),
        record_duration: args.record_duration,
        ..Default::default()
    };

    info!(
        output = %config.output_path.display(),
        duration_s = config.record_duration,
        "starting check phase"
    );

    let orchestrator = match build_orchestrator(&config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            error!(error = %e, "orchestrator construction failed");
            return -1;
        }
    };

    if !orchestrator.execute_check() {
        error!("check failed");
        return 1;
    }

    info!("check completed successfully");
    0
}

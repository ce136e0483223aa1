//! `verify` command implementation.

use contracts::RecorderConfig;
use tracing::{error, info};

use crate::cli::VerifyArgs;

use super::build_orchestrator;

/// Execute the `verify` command. Returns the process exit code:
/// 0 on success, 1 when verification fails, -1 on runtime errors.
pub fn run_verify(args: &VerifyArgs) -> i32 {
    let config = RecorderConfig {
        output_path: args.output_path.clone(),
        verified_path: args.verified_path.clone(),
        ..Default::default()
    };

    info!(
        output = %config.output_path.display(),
        verified = %config.verified_path.display(),
        "starting verify phase"
    );

    let orchestrator = match build_orchestrator(&config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            error!(error = %e, "orchestrator construction failed");
            return -1;
        }
    };

    if !orchestrator.execute_verify() {
        error!("verify failed");
        return 1;
    }

    info!("verify completed successfully");
    0
}

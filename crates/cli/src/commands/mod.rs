//! Command implementations.

mod check;
mod record;
mod verify;

pub use check::run_check;
pub use record::run_record;
pub use verify::run_verify;

use std::sync::Arc;

use contracts::RecorderConfig;
use devices::{MockBagProbe, MockGazeSource, MockRgbdSource};
use managers::{GazeManager, RgbdManager};
use orchestrator::Orchestrator;

/// Per-stage budget used by every command, generous enough to cover
/// the managers' own 10 s warmup liveness window.
pub(crate) const STAGE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Build the orchestrator with both device managers registered.
///
/// Vendor SDK integrations plug in through the same `FrameSource`
/// seams the simulated sources implement.
pub(crate) fn build_orchestrator(config: &RecorderConfig) -> anyhow::Result<Orchestrator> {
    let mut orchestrator = Orchestrator::new();
    orchestrator.set_timeout(STAGE_TIMEOUT);

    let rgbd = RgbdManager::new(
        config.clone(),
        Arc::new(MockRgbdSource::with_defaults("rgbd")),
        Arc::new(MockBagProbe),
    );
    orchestrator.register(Arc::new(rgbd))?;

    let gaze = GazeManager::new(
        config.clone(),
        Arc::new(MockGazeSource::with_defaults("gaze")),
    );
    orchestrator.register(Arc::new(gaze))?;

    Ok(orchestrator)
}

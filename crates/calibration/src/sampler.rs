//! Background calibration sampler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use contracts::TimeSyncSource;
use tracing::{debug, trace};

use crate::TimestampCalibrator;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Polls a time-sync source every 10 ms and feeds the calibrator.
///
/// Failed round trips are skipped; the calibrator may then stay
/// uninitialized and the broker falls back to raw device timestamps.
pub struct CalibrationSampler {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CalibrationSampler {
    /// Spawn the sampling thread.
    pub fn spawn(
        source: Arc<dyn TimeSyncSource>,
        calibrator: Arc<TimestampCalibrator>,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let running_flag = running.clone();

        let handle = thread::Builder::new()
            .name("calibration-sampler".into())
            .spawn(move || {
                debug!("calibration sampler started");

                while running_flag.load(Ordering::Relaxed) {
                    match source.sample() {
                        Some(sample) => calibrator.update(&sample),
                        None => trace!("time-sync round trip failed, skipping"),
                    }
                    thread::sleep(POLL_INTERVAL);
                }

                debug!("calibration sampler stopped");
            })
            .expect("failed to spawn calibration sampler");

        Self {
            running,
            handle: Some(handle),
        }
    }

    /// Signal the thread and join it. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CalibrationSampler {
    fn drop(&mut self) {
        self.stop();
    }
}

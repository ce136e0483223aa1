//! Boot-offset estimator.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use contracts::{wall_clock_us, CalibrationSample};
use tracing::info;

/// Converts device-local microsecond timestamps to wall-clock
/// milliseconds.
///
/// The offset is pinned by the first sample:
/// `boot_utc_offset_us = wall_now_us - (request + response) / 2`.
/// Later samples are accepted but do not move the offset, so reported
/// frame timestamps stay monotone for the whole session. Before
/// initialization `to_global_ms` passes the raw value through,
/// divided to milliseconds.
#[derive(Debug, Default)]
pub struct TimestampCalibrator {
    boot_utc_offset_us: AtomicI64,
    initialized: AtomicBool,
}

impl TimestampCalibrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one time-synchronization round trip.
    pub fn update(&self, sample: &CalibrationSample) {
        if self.initialized.load(Ordering::Acquire) {
            return;
        }

        let avg_host_us = (sample.system_request_us + sample.system_response_us) / 2;
        let offset = wall_clock_us() - avg_host_us;

        self.boot_utc_offset_us.store(offset, Ordering::Release);
        self.initialized.store(true, Ordering::Release);

        info!(boot_utc_offset_us = offset, "timestamp calibration pinned");
    }

    /// Translate a device-local timestamp to wall-clock milliseconds.
    pub fn to_global_ms(&self, timestamp_us: i64) -> f64 {
        let base_ms = timestamp_us as f64 / 1000.0;
        if self.initialized.load(Ordering::Acquire) {
            base_ms + self.boot_utc_offset_us.load(Ordering::Acquire) as f64 / 1000.0
        } else {
            base_ms
        }
    }

    pub fn is_ready(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Current offset estimate (0 until initialized).
    pub fn offset_us(&self) -> i64 {
        self.boot_utc_offset_us.load(Ordering::Acquire)
    }
}

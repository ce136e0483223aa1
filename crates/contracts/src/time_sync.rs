//! Time-synchronization source for device-clock calibration.

use serde::{Deserialize, Serialize};

/// One SDK time-synchronization round trip.
///
/// `system_request_us` and `system_response_us` are host timestamps in
/// the same clock domain as the device's frame timestamps;
/// `device_us` is the hardware clock reading in between.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CalibrationSample {
    pub system_request_us: i64,
    pub device_us: i64,
    pub system_response_us: i64,
}

/// A source of time-synchronization round trips.
///
/// A failed round trip returns `None` and is skipped by the sampler;
/// the calibrator may then remain uninitialized, in which case frame
/// timestamps are emitted raw.
pub trait TimeSyncSource: Send + Sync {
    fn sample(&self) -> Option<CalibrationSample>;
}

//! Device-clock calibration.
//!
//! Maps the eye tracker's device-local monotonic timestamps
//! (microseconds since boot) onto the wall clock. A background sampler
//! polls the SDK's time-synchronization endpoint; the first completed
//! round trip pins the boot offset for the session. The broker reads
//! the offset lock-free on every row.

mod calibrator;
mod sampler;

pub use calibrator::TimestampCalibrator;
pub use sampler::CalibrationSampler;

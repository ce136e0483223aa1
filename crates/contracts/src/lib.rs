//! # Contracts
//!
//! Frozen interface contracts, defining inter-crate data structures and
//! traits. All business crates depend on this crate only; reverse
//! dependencies are prohibited.
//!
//! ## Time model
//! - Wall-clock timestamps are milliseconds since the Unix epoch (f64).
//! - Device-local timestamps are microseconds since device boot (i64);
//!   the calibration crate maps them onto the wall clock.

mod bag;
mod config;
mod error;
mod manager;
mod record;
mod source;
mod time_sync;

pub use bag::{BagProbe, BagRecorder};
pub use config::RecorderConfig;
pub use error::RecorderError;
pub use manager::{DeviceManager, PhaseFlags};
pub use record::*;
pub use source::{CalibrationTarget, FrameCallback, FrameSource, GazeSource, RgbdSource};
pub use time_sync::{CalibrationSample, TimeSyncSource};

/// Milliseconds since the Unix epoch, as the shared wall clock.
pub fn wall_clock_ms() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

/// Microseconds since the Unix epoch.
pub fn wall_clock_us() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}

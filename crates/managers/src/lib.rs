//! Per-device lifecycle managers.
//!
//! A manager owns one device's capture pipeline end to end - source,
//! callback tap, ring, broker, monitor - and sequences it through
//! setup / warmup / start / stop / cleanup for the orchestrator.
//! Check and verify delegate to the offline validators.

mod callback;
mod gaze;
mod rgbd;

pub use callback::CaptureTap;
pub use gaze::GazeManager;
pub use rgbd::RgbdManager;

/// Default first-frame liveness window during warmup. Distinct from
/// the orchestrator's stage budget.
pub const DEFAULT_WARMUP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Ring capacity for the gaze device.
pub const GAZE_RING_CAPACITY: usize = 2048;

/// Ring capacity for the RGB-D device.
pub const RGBD_RING_CAPACITY: usize = 1024;

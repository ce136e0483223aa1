//! `FrameSource` trait - device data source abstraction.
//!
//! Defines a unified interface for frame producers, decoupling managers
//! from concrete SDKs. Vendor SDK wrappers and mock sources implement
//! the same trait.

use std::sync::Arc;

/// Frame callback type.
///
/// The source invokes this on its own (SDK-owned) thread for every
/// frame. The callback must not block: it stamps arrival metadata and
/// enqueues into the manager's ring.
pub type FrameCallback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// A device frame source.
///
/// Abstracts the common behavior of vendor SDK streams and mock
/// sources. The subscription begins at `listen` (during warmup) and
/// ends at `stop`; its lifetime equals the manager's running phase.
pub trait FrameSource<T>: Send + Sync {
    /// Stable device name, used for logging and output paths.
    fn device_name(&self) -> &str;

    /// Register the frame callback and begin streaming.
    ///
    /// Repeated calls while already listening are idempotent.
    fn listen(&self, callback: FrameCallback<T>);

    /// Stop streaming. In-flight callbacks may still fire once.
    fn stop(&self);

    /// Whether the source is currently streaming.
    fn is_listening(&self) -> bool;
}

/// Accepts a previously exported binary calibration blob.
pub trait CalibrationTarget: Send + Sync {
    fn apply_calibration(&self, blob: &[u8]) -> Result<(), crate::RecorderError>;
}

/// The eye tracker's full surface: gaze stream, time-sync endpoint,
/// calibration upload.
pub trait GazeSource:
    FrameSource<crate::GazeSample> + crate::TimeSyncSource + CalibrationTarget
{
}

impl<S> GazeSource for S where
    S: FrameSource<crate::GazeSample> + crate::TimeSyncSource + CalibrationTarget
{
}

/// The RGB-D camera's full surface: frameset stream plus the SDK-side
/// bag recorder.
pub trait RgbdSource: FrameSource<crate::RgbdFrame> + crate::BagRecorder {}

impl<S> RgbdSource for S where S: FrameSource<crate::RgbdFrame> + crate::BagRecorder {}

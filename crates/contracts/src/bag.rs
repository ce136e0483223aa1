//! Recording-file seams for the RGB-D device.
//!
//! The concrete bag container is produced and validated by the vendor
//! SDK; these traits are the boundary the pipeline talks to.

use std::path::Path;

use crate::RecorderError;

/// Writes the binary recording file alongside the CSV stream.
///
/// `begin` is called during device setup with the target path;
/// `append` once per captured frameset; `finish` on stop.
pub trait BagRecorder: Send + Sync {
    fn begin(&self, path: &Path) -> Result<(), RecorderError>;
    fn append(&self, color_frame_number: u64, depth_frame_number: u64);
    fn finish(&self) -> Result<(), RecorderError>;
}

/// Opens a recording file read-only and probes that a playback
/// pipeline can start and stop on it.
pub trait BagProbe: Send + Sync {
    fn probe(&self, path: &Path) -> Result<(), RecorderError>;
}

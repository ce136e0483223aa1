//! Process-wide recorder configuration.
//!
//! Populated once at startup from the CLI and passed explicitly
//! through constructors.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Recorder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Root directory for recording artifacts.
    pub output_path: PathBuf,

    /// Directory for verification result CSVs.
    pub verified_path: PathBuf,

    /// Optional binary calibration blob for the gaze device.
    pub calibration_path: Option<PathBuf>,

    /// Recording duration in seconds.
    pub record_duration: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("./output/"),
            verified_path: PathBuf::from("./verified/"),
            calibration_path: None,
            record_duration: 5,
        }
    }
}

impl RecorderConfig {
    /// Output subdirectory for a device.
    pub fn device_dir(&self, device: &str) -> PathBuf {
        self.output_path.join(device)
    }
}

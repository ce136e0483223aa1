//! Flat-structure checkers.
//!
//! The degenerate single-recording case: no session enumeration, just
//! the device directory under the output root with one CSV (and, for
//! RGB-D, one bag).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use contracts::{BagProbe, RecorderConfig, RecorderError};
use tracing::{info, warn};

use crate::session::{find_bag, find_csv};

/// Single-recording sanity check for the gaze device.
pub struct GazeChecker {
    config: RecorderConfig,
}

impl GazeChecker {
    pub fn new(config: RecorderConfig) -> Self {
        Self { config }
    }

    pub fn check(&self) -> Result<bool, RecorderError> {
        check_csv(&self.config.device_dir("gaze"), self.config.record_duration)
    }
}

/// Single-recording sanity check for the RGB-D device: CSV plus bag.
pub struct RgbdChecker {
    config: RecorderConfig,
    probe: Arc<dyn BagProbe>,
}

impl RgbdChecker {
    pub fn new(config: RecorderConfig, probe: Arc<dyn BagProbe>) -> Self {
        Self { config, probe }
    }

    pub fn check(&self) -> Result<bool, RecorderError> {
        let device_dir = self.config.device_dir("rgbd");

        let csv_ok = check_csv(&device_dir, self.config.record_duration)?;

        let bag_ok = match find_bag(&device_dir) {
            Some(bag_path) => match self.probe.probe(&bag_path) {
                Ok(()) => true,
                Err(e) => {
                    warn!(path = %bag_path.display(), error = %e, "bag check failed");
                    false
                }
            },
            None => {
                warn!(dir = %device_dir.display(), "no bag file found");
                false
            }
        };

        Ok(csv_ok && bag_ok)
    }
}

/// The CSV must exist, carry an `index,`-prefixed header, and hold at
/// least `record_duration * 60` data rows.
fn check_csv(device_dir: &Path, record_duration: u64) -> Result<bool, RecorderError> {
    let Some(csv_path) = find_csv(device_dir) else {
        warn!(dir = %device_dir.display(), "no csv file found");
        return Ok(false);
    };

    let file = File::open(&csv_path)?;
    let mut lines = BufReader::new(file).lines();

    let Some(header) = lines.next().transpose()? else {
        warn!(path = %csv_path.display(), "csv is empty");
        return Ok(false);
    };
    if !header.starts_with("index,") {
        warn!(path = %csv_path.display(), "invalid csv header");
        return Ok(false);
    }

    let mut data_rows = 0u64;
    for line in lines {
        if !line?.is_empty() {
            data_rows += 1;
        }
    }

    let required = record_duration * 60;
    let ok = data_rows >= required;
    info!(
        path = %csv_path.display(),
        data_rows,
        required,
        ok,
        "csv checked"
    );

    Ok(ok)
}

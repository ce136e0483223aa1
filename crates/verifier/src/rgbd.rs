//! RGB-D device verification.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use contracts::{BagProbe, RecorderConfig, RecorderError};
use tracing::{error, info, warn};

use crate::session::{find_bag, latest_videos, scan_sessions};
use crate::timing::VideoTiming;
use crate::{classify_frame_count, FrameCountStatus};

const DEVICE: &str = "rgbd";
const COL_TIMESTAMP: usize = 1;

/// Size polls while waiting for the bag file to stop growing.
const STABILITY_POLLS: u32 = 10;
const STABILITY_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug)]
struct RgbdVideoResult {
    video_name: String,
    valid: bool,
    duration_s: f64,
    total_frames: u64,
    expected_frames: u64,
    capturing_success_frames: u64,
    bag_valid: bool,
}

/// Session-structured validation of the RGB-D recordings: CSV row
/// accounting per video plus a playback probe of each session's bag.
pub struct RgbdVerifier {
    config: RecorderConfig,
    probe: Arc<dyn BagProbe>,
}

impl RgbdVerifier {
    pub fn new(config: RecorderConfig, probe: Arc<dyn BagProbe>) -> Self {
        Self { config, probe }
    }

    /// Validate every logical video; the returned flag reflects the
    /// CSV accounting, while per-video bag validity lands in the
    /// result CSV.
    pub fn verify(&self) -> Result<bool, RecorderError> {
        info!(device = DEVICE, "starting verification");

        let sessions = scan_sessions(&self.config.output_path, DEVICE);
        if sessions.is_empty() {
            error!(device = DEVICE, "no valid sessions found");
            return Ok(false);
        }

        let latest = latest_videos(&sessions);
        info!(device = DEVICE, videos = latest.len(), "using latest recordings");

        let mut all_valid = true;
        let mut results = Vec::with_capacity(latest.len());

        for (video, session) in latest.into_values() {
            let expected_frames = (video.duration_s() * 60.0) as u64;
            let mut result = RgbdVideoResult {
                video_name: video.video_name(),
                valid: false,
                duration_s: video.duration_s(),
                total_frames: 0,
                expected_frames,
                capturing_success_frames: 0,
                bag_valid: false,
            };

            match scan_rgbd_rows(&session.csv_path, &video) {
                Ok(total) => {
                    result.total_frames = total;
                    result.capturing_success_frames = total;

                    let status = classify_frame_count(total, expected_frames);
                    result.valid = status != FrameCountStatus::Fail;
                    if status == FrameCountStatus::Fail {
                        all_valid = false;
                    }

                    info!(
                        device = DEVICE,
                        video = %result.video_name,
                        total,
                        expected = expected_frames,
                        status = ?status,
                        "video verified"
                    );
                }
                Err(e) => {
                    warn!(
                        device = DEVICE,
                        video = %result.video_name,
                        error = %e,
                        "csv processing failed"
                    );
                    all_valid = false;
                }
            }

            result.bag_valid = self.verify_session_bag(&session.device_dir);
            result.valid = result.valid && result.bag_valid;

            results.push(result);
        }

        self.write_results(&results)?;

        info!(device = DEVICE, all_valid, "verification finished");
        Ok(all_valid)
    }

    /// Probe the session's bag on a temporary copy so the live file is
    /// never locked.
    fn verify_session_bag(&self, device_dir: &Path) -> bool {
        let Some(bag_path) = find_bag(device_dir) else {
            warn!(device = DEVICE, dir = %device_dir.display(), "bag file not found");
            return false;
        };

        if !wait_for_stable_size(&bag_path) {
            warn!(device = DEVICE, path = %bag_path.display(), "bag still growing");
            return false;
        }

        let scratch = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                warn!(error = %e, "cannot create scratch dir for bag probe");
                return false;
            }
        };
        let copy = scratch.path().join("probe.bag");
        if let Err(e) = fs::copy(&bag_path, &copy) {
            warn!(path = %bag_path.display(), error = %e, "bag copy failed");
            return false;
        }

        match self.probe.probe(&copy) {
            Ok(()) => {
                info!(device = DEVICE, path = %bag_path.display(), "bag probe succeeded");
                true
            }
            Err(e) => {
                warn!(device = DEVICE, path = %bag_path.display(), error = %e, "bag probe failed");
                false
            }
        }
    }

    fn write_results(&self, results: &[RgbdVideoResult]) -> Result<(), RecorderError> {
        fs::create_dir_all(&self.config.verified_path)?;
        let path = self.config.verified_path.join("rgbd_verify_result.csv");
        let mut csv = File::create(&path)?;

        writeln!(
            csv,
            "video_name,duration,total_frames,expected_frames,\
             capturing_success_frames,bag_valid"
        )?;
        for r in results {
            writeln!(
                csv,
                "{},{:.3},{},{},{},{}",
                r.video_name,
                r.duration_s,
                r.total_frames,
                r.expected_frames,
                r.capturing_success_frames,
                r.bag_valid
            )?;
        }

        info!(device = DEVICE, path = %path.display(), "results written");
        Ok(())
    }
}

/// Count rows whose timestamp falls inside the video window.
fn scan_rgbd_rows(csv_path: &Path, video: &VideoTiming) -> Result<u64, RecorderError> {
    let file = File::open(csv_path)
        .map_err(|e| RecorderError::verify(format!("cannot open {}: {e}", csv_path.display())))?;
    let mut lines = BufReader::new(file).lines();

    let header = lines
        .next()
        .transpose()?
        .ok_or_else(|| RecorderError::verify("csv has no header"))?;
    if !header.starts_with("index,") {
        return Err(RecorderError::verify("invalid csv header"));
    }

    let mut total = 0u64;
    for line in lines {
        let line = line?;
        if line.is_empty() {
            continue;
        }

        let Some(field) = line.split(',').nth(COL_TIMESTAMP) else {
            continue;
        };
        let Ok(timestamp_ms) = field.parse::<f64>() else {
            continue;
        };

        let timestamp_s = timestamp_ms / 1000.0;
        if timestamp_s >= video.start_time_s && timestamp_s <= video.end_time_s {
            total += 1;
        }
    }

    Ok(total)
}

/// Poll the file size until it stops changing, up to one second.
fn wait_for_stable_size(path: &Path) -> bool {
    let Ok(mut last_size) = fs::metadata(path).map(|m| m.len()) else {
        return false;
    };

    for poll in 0..STABILITY_POLLS {
        thread::sleep(STABILITY_POLL_INTERVAL);
        let Ok(size) = fs::metadata(path).map(|m| m.len()) else {
            return false;
        };
        if size == last_size {
            return true;
        }
        last_size = size;
        if poll == STABILITY_POLLS - 1 {
            return false;
        }
    }

    false
}

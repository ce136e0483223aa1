//! Gaze device verification.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use contracts::{RecorderConfig, RecorderError};
use tracing::{error, info, warn};

use crate::session::{latest_videos, scan_sessions};
use crate::timing::VideoTiming;
use crate::{classify_frame_count, FrameCountStatus};

const DEVICE: &str = "gaze";

/// Column indices in `gaze_data.csv`.
const COL_TIMESTAMP: usize = 1;
const COL_LEFT_VALIDITY: usize = 8;
const COL_RIGHT_VALIDITY: usize = 19;

/// Minimum columns a row needs to reach the validity fields.
const MIN_FIELDS: usize = 20;

#[derive(Debug)]
struct GazeVideoResult {
    video_name: String,
    valid: bool,
    duration_s: f64,
    total_frames: u64,
    expected_frames: u64,
    tracking_success_frames: u64,
    tracking_failed_frames: u64,
}

#[derive(Debug, Default)]
struct RowAccounting {
    total_frames: u64,
    tracking_success_frames: u64,
    tracking_failed_frames: u64,
}

/// Session-structured validation of the gaze recordings.
pub struct GazeVerifier {
    config: RecorderConfig,
}

impl GazeVerifier {
    pub fn new(config: RecorderConfig) -> Self {
        Self { config }
    }

    /// Validate every logical video against the gaze CSVs; returns
    /// whether all videos passed.
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
            let mut result = GazeVideoResult {
                video_name: video.video_name(),
                valid: false,
                duration_s: video.duration_s(),
                total_frames: 0,
                expected_frames,
                tracking_success_frames: 0,
                tracking_failed_frames: 0,
            };

            match scan_gaze_rows(&session.csv_path, &video) {
                Ok(acc) => {
                    result.total_frames = acc.total_frames;
                    result.tracking_success_frames = acc.tracking_success_frames;
                    result.tracking_failed_frames = acc.tracking_failed_frames;

                    let status = classify_frame_count(acc.total_frames, expected_frames);
                    result.valid = status != FrameCountStatus::Fail;
                    if status == FrameCountStatus::Fail {
                        all_valid = false;
                    }

                    info!(
                        device = DEVICE,
                        video = %result.video_name,
                        total = acc.total_frames,
                        expected = expected_frames,
                        tracking_success = acc.tracking_success_frames,
                        tracking_failed = acc.tracking_failed_frames,
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

            results.push(result);
        }

        self.write_results(&results)?;

        info!(device = DEVICE, all_valid, "verification finished");
        Ok(all_valid)
    }

    fn write_results(&self, results: &[GazeVideoResult]) -> Result<(), RecorderError> {
        fs::create_dir_all(&self.config.verified_path)?;
        let path = self.config.verified_path.join("gaze_verify_result.csv");
        let mut csv = File::create(&path)?;

        writeln!(
            csv,
            "video_name,duration,total_frames,expected_frames,\
             tracking_success_frames,tracking_failed_frames"
        )?;
        for r in results {
            writeln!(
                csv,
                "{},{:.3},{},{},{},{}",
                r.video_name,
                r.duration_s,
                r.total_frames,
                r.expected_frames,
                r.tracking_success_frames,
                r.tracking_failed_frames
            )?;
        }

        info!(device = DEVICE, path = %path.display(), "results written");
        Ok(())
    }
}

/// Count rows whose timestamp falls inside the video window, plus
/// tracking quality: a row fails tracking only when both eyes are
/// invalid.
fn scan_gaze_rows(csv_path: &Path, video: &VideoTiming) -> Result<RowAccounting, RecorderError> {
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

    let mut acc = RowAccounting::default();

    for line in lines {
        let line = line?;
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < MIN_FIELDS {
            continue;
        }

        let Ok(timestamp_ms) = fields[COL_TIMESTAMP].parse::<f64>() else {
            continue;
        };

        let timestamp_s = timestamp_ms / 1000.0;
        if timestamp_s < video.start_time_s || timestamp_s > video.end_time_s {
            continue;
        }

        acc.total_frames += 1;

        let left_valid = fields[COL_LEFT_VALIDITY] == "1";
        let right_valid = fields[COL_RIGHT_VALIDITY] == "1";
        if !left_valid && !right_valid {
            acc.tracking_failed_frames += 1;
        } else {
            acc.tracking_success_frames += 1;
        }
    }

    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gaze_row(index: usize, timestamp_ms: f64, left: u8, right: u8) -> String {
        // 27 columns matching the writer's layout.
        let mut fields = vec!["0".to_string(); 27];
        fields[0] = index.to_string();
        fields[COL_TIMESTAMP] = format!("{timestamp_ms:.3}");
        fields[COL_LEFT_VALIDITY] = left.to_string();
        fields[COL_RIGHT_VALIDITY] = right.to_string();
        fields.join(",")
    }

    fn write_csv(dir: &Path, rows: &[String]) -> std::path::PathBuf {
        let path = dir.join("gaze_data.csv");
        let mut content = String::from("index,frame_timestamp,rest\n");
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        fs::write(&path, content).unwrap();
        path
    }

    fn video(start_s: f64, end_s: f64) -> VideoTiming {
        VideoTiming {
            video_index: 1,
            start_time_s: start_s,
            end_time_s: end_s,
            end_type: "COMPLETED".into(),
        }
    }

    #[test]
    fn test_window_accounting() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![
            gaze_row(0, 500.0, 1, 1),    // before window
            gaze_row(1, 1_000.0, 1, 1),  // at start
            gaze_row(2, 2_000.0, 0, 1),  // inside
            gaze_row(3, 5_000.0, 0, 0),  // at end, both eyes failed
            gaze_row(4, 6_000.0, 1, 1),  // after window
        ];
        let csv = write_csv(dir.path(), &rows);

        let acc = scan_gaze_rows(&csv, &video(1.0, 5.0)).unwrap();
        assert_eq!(acc.total_frames, 3);
        assert_eq!(acc.tracking_success_frames, 2);
        assert_eq!(acc.tracking_failed_frames, 1);
    }

    #[test]
    fn test_short_and_unparseable_rows_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut rows = vec![gaze_row(0, 2_000.0, 1, 1)];
        rows.push("1,notanumber,0,0".to_string());
        rows.push("2,3000.0".to_string()); // too few fields
        let csv = write_csv(dir.path(), &rows);

        let acc = scan_gaze_rows(&csv, &video(0.0, 10.0)).unwrap();
        assert_eq!(acc.total_frames, 1);
    }

    #[test]
    fn test_bad_header_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gaze_data.csv");
        fs::write(&path, "wrong,header\n").unwrap();

        assert!(scan_gaze_rows(&path, &video(0.0, 1.0)).is_err());
    }

    #[test]
    fn test_verify_without_sessions_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecorderConfig {
            output_path: dir.path().to_path_buf(),
            verified_path: dir.path().join("verified"),
            ..Default::default()
        };

        assert!(!GazeVerifier::new(config).verify().unwrap());
    }
}

//! Session discovery and shadowing.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::timing::{parse_frame_timing, SessionTiming, VideoTiming};

/// One recording session found under the output root.
#[derive(Debug, Clone)]
pub struct SessionData {
    pub name: String,
    pub path: PathBuf,
    pub timing: SessionTiming,

    /// The device's data CSV inside this session.
    pub csv_path: PathBuf,

    /// The device subdirectory (holds the bag for RGB-D).
    pub device_dir: PathBuf,
}

/// Enumerate `session_*` directories that carry a parseable timing
/// log and a CSV for the given device, sorted by name (chronological).
pub fn scan_sessions(output_root: &Path, device: &str) -> Vec<SessionData> {
    let mut sessions = Vec::new();

    let Ok(entries) = fs::read_dir(output_root) else {
        return sessions;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with("session_") {
            continue;
        }

        let Ok(timing) = parse_frame_timing(&path.join("frame_timing.log")) else {
            continue;
        };
        if !timing.is_valid() {
            continue;
        }

        let device_dir = path.join(device);
        let Some(csv_path) = find_csv(&device_dir) else {
            continue;
        };

        info!(
            session = %name,
            videos = timing.videos.len(),
            "found session"
        );
        sessions.push(SessionData {
            name,
            path,
            timing,
            csv_path,
            device_dir,
        });
    }

    sessions.sort_by(|a, b| a.name.cmp(&b.name));
    sessions
}

/// Map each video index to the latest session containing it: later
/// sessions shadow earlier ones.
pub fn latest_videos(sessions: &[SessionData]) -> BTreeMap<i32, (VideoTiming, SessionData)> {
    let mut latest = BTreeMap::new();

    for session in sessions {
        for video in &session.timing.videos {
            debug!(
                video_index = video.video_index,
                session = %session.name,
                "video mapped to session"
            );
            latest.insert(video.video_index, (video.clone(), session.clone()));
        }
    }

    latest
}

/// First `.csv` file directly inside a directory.
pub fn find_csv(dir: &Path) -> Option<PathBuf> {
    find_by_extension(dir, "csv")
}

/// First `.bag` file directly inside a directory.
pub fn find_bag(dir: &Path) -> Option<PathBuf> {
    find_by_extension(dir, "bag")
}

fn find_by_extension(dir: &Path, ext: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some(ext))
        .collect();
    paths.sort();
    paths.into_iter().next()
}

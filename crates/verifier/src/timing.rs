//! `frame_timing.log` parsing.
//!
//! Line-oriented, whitespace-separated:
//!
//! ```text
//! FIRST_FRAME <float seconds> VIDEO_INDEX_<int>
//! LAST_FRAME  <float seconds> VIDEO_INDEX_<int> <end_type>
//! ```
//!
//! Lines may appear in any order; pairing is by video index. A video
//! is kept only once its `LAST_FRAME` line has been seen.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use contracts::RecorderError;
use tracing::{debug, warn};

/// Wall-clock boundaries of one logical video within a session.
#[derive(Debug, Clone)]
pub struct VideoTiming {
    pub video_index: i32,
    pub start_time_s: f64,
    pub end_time_s: f64,
    pub end_type: String,
}

impl VideoTiming {
    pub fn duration_s(&self) -> f64 {
        self.end_time_s - self.start_time_s
    }

    pub fn video_name(&self) -> String {
        format!("VIDEO_INDEX_{}", self.video_index)
    }
}

/// All videos parsed from one session's timing log, ordered by index.
#[derive(Debug, Clone, Default)]
pub struct SessionTiming {
    pub videos: Vec<VideoTiming>,
}

impl SessionTiming {
    pub fn is_valid(&self) -> bool {
        !self.videos.is_empty()
    }
}

#[derive(Default)]
struct PartialTiming {
    start_time_s: f64,
    end_time_s: f64,
    end_type: String,
    has_end: bool,
}

/// Parse a `frame_timing.log`. Unrecognized or malformed lines are
/// skipped with a warning; a missing file is an error.
pub fn parse_frame_timing(path: &Path) -> Result<SessionTiming, RecorderError> {
    let content = fs::read_to_string(path).map_err(|e| {
        RecorderError::verify(format!("cannot read {}: {e}", path.display()))
    })?;

    let mut partial: BTreeMap<i32, PartialTiming> = BTreeMap::new();

    for line in content.lines() {
        let mut tokens = line.split_whitespace();
        let Some(token) = tokens.next() else { continue };

        match token {
            "FIRST_FRAME" => {
                let Some((timestamp, index)) = parse_stamp_and_index(&mut tokens) else {
                    warn!(line, "malformed FIRST_FRAME line skipped");
                    continue;
                };
                partial.entry(index).or_default().start_time_s = timestamp;
            }
            "LAST_FRAME" => {
                let Some((timestamp, index)) = parse_stamp_and_index(&mut tokens) else {
                    warn!(line, "malformed LAST_FRAME line skipped");
                    continue;
                };
                let entry = partial.entry(index).or_default();
                entry.end_time_s = timestamp;
                entry.end_type = tokens.next().unwrap_or_default().to_string();
                entry.has_end = true;
            }
            _ => {}
        }
    }

    let videos: Vec<VideoTiming> = partial
        .into_iter()
        .filter(|(_, p)| p.has_end)
        .map(|(video_index, p)| VideoTiming {
            video_index,
            start_time_s: p.start_time_s,
            end_time_s: p.end_time_s,
            end_type: p.end_type,
        })
        .collect();

    debug!(path = %path.display(), videos = videos.len(), "frame timing parsed");
    Ok(SessionTiming { videos })
}

/// Parse `<float seconds> VIDEO_INDEX_<int>` from the remaining
/// tokens.
fn parse_stamp_and_index<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
) -> Option<(f64, i32)> {
    let timestamp: f64 = tokens.next()?.parse().ok()?;
    let index_token = tokens.next()?;
    let index: i32 = index_token.rsplit('_').next()?.parse().ok()?;
    Some((timestamp, index))
}

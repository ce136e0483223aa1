//! Epoch-stamped monitor log file.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;

/// Append-only event log named `<prefix>_<epoch>.log` under the
/// output root. The mutex is held only for the write itself; the hot
/// path never calls in here directly.
pub struct MonitorLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl MonitorLog {
    /// Create `<dir>/<prefix>_<epoch>.log`.
    pub fn create(dir: &Path, prefix: &str) -> std::io::Result<Self> {
        fs::create_dir_all(dir)?;

        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let path = dir.join(format!("{prefix}_{epoch}.log"));
        let writer = BufWriter::new(File::create(&path)?);

        Ok(Self {
            path,
            writer: Mutex::new(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one `[epoch] EVENT: details` line.
    pub fn event(&self, event: &str, details: &str) {
        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut writer = self.writer.lock().expect("monitor log poisoned");
        if let Err(e) = writeln!(writer, "[{epoch}] {event}: {details}").and_then(|_| writer.flush())
        {
            warn!(path = %self.path.display(), error = %e, "monitor log write failed");
        }
    }

    /// Write one raw `[epoch] <line>` line (section markers etc).
    pub fn line(&self, line: &str) {
        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut writer = self.writer.lock().expect("monitor log poisoned");
        if let Err(e) = writeln!(writer, "[{epoch}] {line}").and_then(|_| writer.flush()) {
            warn!(path = %self.path.display(), error = %e, "monitor log write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_writes_stamped_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = MonitorLog::create(dir.path(), "rgbd_monitor").unwrap();

        log.line("=== MONITOR STARTED ===");
        log.event("QUEUE_OVERFLOW", "Frame queue overflow detected");

        let content = fs::read_to_string(log.path()).unwrap();
        assert!(content.contains("=== MONITOR STARTED ==="));
        assert!(content.contains("QUEUE_OVERFLOW: Frame queue overflow detected"));
        assert!(content.starts_with('['));
    }

    #[test]
    fn test_log_filename_carries_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let log = MonitorLog::create(dir.path(), "gaze_monitor").unwrap();
        let name = log.path().file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("gaze_monitor_"));
        assert!(name.ends_with(".log"));
    }
}

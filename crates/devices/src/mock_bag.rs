//! Mock bag container: recorder and read-only probe.
//!
//! The format is deliberately minimal - a magic header followed by
//! fixed-width frame entries - just enough for the probe to
//! distinguish a complete recording from a truncated or foreign file.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use contracts::{BagProbe, BagRecorder, RecorderError};
use tracing::{debug, warn};

/// Magic bytes opening every mock bag file.
pub const BAG_MAGIC: &[u8] = b"RECBAG1\n";

/// Fixed-width frame entry: color frame number + depth frame number.
const ENTRY_BYTES: usize = 16;

/// Appends framesets to a bag file while the stream runs.
///
/// Clones share the same underlying writer so the source's callback
/// thread and the owning manager can both reach it.
#[derive(Clone)]
pub struct MockBagRecorder {
    inner: Arc<Mutex<Option<BufWriter<File>>>>,
}

impl MockBagRecorder {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }
}

impl Default for MockBagRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl BagRecorder for MockBagRecorder {
    fn begin(&self, path: &Path) -> Result<(), RecorderError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(BAG_MAGIC)?;

        *self.inner.lock().expect("bag recorder poisoned") = Some(writer);
        debug!(path = %path.display(), "bag recording started");
        Ok(())
    }

    fn append(&self, color_frame_number: u64, depth_frame_number: u64) {
        let mut guard = self.inner.lock().expect("bag recorder poisoned");
        if let Some(writer) = guard.as_mut() {
            let mut entry = [0u8; ENTRY_BYTES];
            entry[..8].copy_from_slice(&color_frame_number.to_le_bytes());
            entry[8..].copy_from_slice(&depth_frame_number.to_le_bytes());

            if let Err(e) = writer.write_all(&entry) {
                warn!(error = %e, "bag append failed, frame not recorded");
            }
        }
    }

    fn finish(&self) -> Result<(), RecorderError> {
        let mut guard = self.inner.lock().expect("bag recorder poisoned");
        if let Some(mut writer) = guard.take() {
            writer.flush()?;
            debug!("bag recording finished");
        }
        Ok(())
    }
}

/// Read-only playback probe for mock bag files.
pub struct MockBagProbe;

impl BagProbe for MockBagProbe {
    fn probe(&self, path: &Path) -> Result<(), RecorderError> {
        let mut file = File::open(path)?;

        let mut magic = [0u8; BAG_MAGIC.len()];
        file.read_exact(&mut magic)
            .map_err(|_| RecorderError::verify("bag file truncated before header"))?;

        if magic != *BAG_MAGIC {
            return Err(RecorderError::verify("bag header mismatch"));
        }

        let body_len = file.metadata()?.len() as usize - BAG_MAGIC.len();
        if body_len == 0 {
            return Err(RecorderError::verify("bag contains no frames"));
        }
        if body_len % ENTRY_BYTES != 0 {
            return Err(RecorderError::verify("bag ends mid-entry"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_then_probe_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.bag");

        let recorder = MockBagRecorder::new();
        recorder.begin(&path).unwrap();
        for i in 0..10 {
            recorder.append(i, i);
        }
        recorder.finish().unwrap();

        assert!(MockBagProbe.probe(&path).is_ok());
    }

    #[test]
    fn test_probe_rejects_empty_bag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.bag");

        let recorder = MockBagRecorder::new();
        recorder.begin(&path).unwrap();
        recorder.finish().unwrap();

        assert!(MockBagProbe.probe(&path).is_err());
    }

    #[test]
    fn test_probe_rejects_foreign_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_a_bag.bag");
        std::fs::write(&path, b"definitely not a recording").unwrap();

        assert!(MockBagProbe.probe(&path).is_err());
    }

    #[test]
    fn test_probe_rejects_truncated_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trunc.bag");

        let mut bytes = BAG_MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 7]); // partial entry
        std::fs::write(&path, &bytes).unwrap();

        assert!(MockBagProbe.probe(&path).is_err());
    }

    #[test]
    fn test_append_before_begin_is_ignored() {
        let recorder = MockBagRecorder::new();
        recorder.append(1, 1); // no writer yet; must not panic
        recorder.finish().unwrap();
    }
}

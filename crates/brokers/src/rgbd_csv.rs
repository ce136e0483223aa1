//! RGB-D CSV writer.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use contracts::{Captured, RgbdFrame};
use observability::{DeviceMonitor, FrameKind};
use tracing::error;

use crate::PreviewSlot;

const HEADER: &str = "index,color_timestamp,depth_timestamp,color_frame_number,depth_frame_number";

/// Serializes RGB-D framesets to `rgbd_data.csv` and publishes the
/// latest color image for the preview thread.
pub struct RgbdCsvWriter {
    path: PathBuf,
    csv: BufWriter<File>,
    monitor: Arc<DeviceMonitor>,
    preview: Option<PreviewSlot>,
    index: u64,
}

impl RgbdCsvWriter {
    /// Create the device directory and `rgbd_data.csv` with its
    /// header.
    pub fn create(
        device_dir: &Path,
        monitor: Arc<DeviceMonitor>,
        preview: Option<PreviewSlot>,
    ) -> std::io::Result<Self> {
        fs::create_dir_all(device_dir)?;

        let path = device_dir.join("rgbd_data.csv");
        let mut csv = BufWriter::new(File::create(&path)?);
        writeln!(csv, "{HEADER}")?;

        Ok(Self {
            path,
            csv,
            monitor,
            preview,
            index: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows_written(&self) -> u64 {
        self.index
    }

    fn write_row(&mut self, frame: &RgbdFrame) -> std::io::Result<()> {
        writeln!(
            self.csv,
            "{},{:.14},{:.14},{},{}",
            self.index,
            frame.color_timestamp_ms,
            frame.depth_timestamp_ms,
            frame.color_frame_number,
            frame.depth_frame_number
        )?;

        self.index += 1;
        Ok(())
    }
}

impl crate::RecordProcessor<Captured<RgbdFrame>> for RgbdCsvWriter {
    fn process(&mut self, record: Captured<RgbdFrame>) {
        self.monitor.on_frame_kind(FrameKind::Color);
        self.monitor.on_frame_kind(FrameKind::Depth);

        if let Err(e) = self.write_row(&record.payload) {
            error!(writer = "rgbd_csv", index = self.index, error = %e, "row write failed");
            self.monitor.on_error(&format!("rgbd csv row write failed: {e}"));
        }

        if let (Some(slot), Some(color)) = (&self.preview, record.payload.color) {
            slot.publish(color);
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.csv.flush() {
            error!(writer = "rgbd_csv", error = %e, "flush failed");
        }
    }
}

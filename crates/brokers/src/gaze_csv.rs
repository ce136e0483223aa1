//! Gaze CSV writer.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use calibration::TimestampCalibrator;
use contracts::{Captured, EyeSample, GazeSample};
use observability::{DeviceMonitor, FrameKind};
use tracing::error;

const HEADER: &str = "index,\
frame_timestamp,frame_hardware_timestamp,\
left_gaze_display_x,left_gaze_display_y,\
left_gaze_3d_x,left_gaze_3d_y,left_gaze_3d_z,left_gaze_validity,\
left_gaze_origin_x,left_gaze_origin_y,left_gaze_origin_z,left_gaze_origin_validity,\
left_pupil_diameter,left_pupil_validity,\
right_gaze_display_x,right_gaze_display_y,\
right_gaze_3d_x,right_gaze_3d_y,right_gaze_3d_z,right_gaze_validity,\
right_gaze_origin_x,right_gaze_origin_y,right_gaze_origin_z,right_gaze_origin_validity,\
right_pupil_diameter,right_pupil_validity";

/// Serializes gaze samples to `gaze_data.csv`, translating device
/// timestamps through the calibrator.
pub struct GazeCsvWriter {
    path: PathBuf,
    csv: BufWriter<File>,
    calibrator: Arc<TimestampCalibrator>,
    monitor: Arc<DeviceMonitor>,

    /// Next row index; equals the count of rows already written.
    index: u64,
}

impl GazeCsvWriter {
    /// Create the device directory and `gaze_data.csv` with its
    /// header.
    pub fn create(
        device_dir: &Path,
        calibrator: Arc<TimestampCalibrator>,
        monitor: Arc<DeviceMonitor>,
    ) -> std::io::Result<Self> {
        fs::create_dir_all(device_dir)?;

        let path = device_dir.join("gaze_data.csv");
        let mut csv = BufWriter::new(File::create(&path)?);
        writeln!(csv, "{HEADER}")?;

        Ok(Self {
            path,
            csv,
            calibrator,
            monitor,
            index: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows_written(&self) -> u64 {
        self.index
    }

    fn write_row(&mut self, sample: &GazeSample) -> std::io::Result<()> {
        let frame_timestamp = self.calibrator.to_global_ms(sample.system_time_us);

        write!(
            self.csv,
            "{},{:.14},{}",
            self.index, frame_timestamp, sample.device_time_us
        )?;
        write_eye(&mut self.csv, &sample.left)?;
        write_eye(&mut self.csv, &sample.right)?;
        writeln!(self.csv)?;

        self.index += 1;
        Ok(())
    }
}

fn write_eye(csv: &mut impl Write, eye: &EyeSample) -> std::io::Result<()> {
    write!(
        csv,
        ",{},{},{},{},{},{},{},{},{},{},{},{}",
        eye.gaze_display[0],
        eye.gaze_display[1],
        eye.gaze_3d[0],
        eye.gaze_3d[1],
        eye.gaze_3d[2],
        eye.gaze_validity,
        eye.origin[0],
        eye.origin[1],
        eye.origin[2],
        eye.origin_validity,
        eye.pupil_diameter,
        eye.pupil_validity
    )
}

impl crate::RecordProcessor<Captured<GazeSample>> for GazeCsvWriter {
    fn process(&mut self, record: Captured<GazeSample>) {
        self.monitor.on_frame_kind(FrameKind::Gaze);

        if let Err(e) = self.write_row(&record.payload) {
            error!(writer = "gaze_csv", index = self.index, error = %e, "row write failed");
            self.monitor.on_error(&format!("gaze csv row write failed: {e}"));
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.csv.flush() {
            error!(writer = "gaze_csv", error = %e, "flush failed");
        }
    }
}

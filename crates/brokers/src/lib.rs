//! Consumer workers and artifact writers.
//!
//! A broker drains its device's ring on a dedicated thread and
//! serializes each record to the device CSV; the RGB-D broker
//! additionally feeds a 1 Hz preview image thread. Per-row write
//! failures are logged and skipped - the broker never takes the
//! manager down over a single sample.

mod gaze_csv;
mod preview;
mod rgbd_csv;
mod worker;

pub use gaze_csv::GazeCsvWriter;
pub use preview::{PreviewSlot, PreviewWriter};
pub use rgbd_csv::RgbdCsvWriter;
pub use worker::{BrokerWorker, RecordProcessor};

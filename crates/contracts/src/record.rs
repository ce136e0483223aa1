//! Frame records produced by device callbacks and drained by brokers.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A captured sample: the device payload plus arrival metadata stamped
/// by the callback.
///
/// Created on the SDK callback thread, moved through the ring, consumed
/// by the broker after serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Captured<T> {
    /// Monotonically increasing per-device sequence number.
    pub seq: u64,

    /// Wall-clock arrival time (milliseconds since epoch).
    pub arrival_ms: f64,

    /// Device payload.
    pub payload: T,
}

/// One eye's worth of a gaze sample.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EyeSample {
    /// Gaze point on the display area, normalized coordinates.
    pub gaze_display: [f64; 2],

    /// Gaze point in user coordinates (mm).
    pub gaze_3d: [f64; 3],

    /// Gaze point validity (0 or 1).
    pub gaze_validity: u8,

    /// Gaze origin in user coordinates (mm).
    pub origin: [f64; 3],

    /// Gaze origin validity (0 or 1).
    pub origin_validity: u8,

    /// Pupil diameter (mm).
    pub pupil_diameter: f64,

    /// Pupil validity (0 or 1).
    pub pupil_validity: u8,
}

/// One eye-tracker sample as delivered by the SDK callback.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GazeSample {
    /// Device-local monotonic timestamp (microseconds since boot).
    pub system_time_us: i64,

    /// Hardware timestamp (microseconds).
    pub device_time_us: i64,

    pub left: EyeSample,
    pub right: EyeSample,
}

/// Pixel format of an image payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Rgb8,
    Z16,
}

/// Raw image payload carried alongside an RGB-D frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePayload {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,

    /// Raw pixel data (zero-copy).
    pub data: Bytes,
}

/// One RGB-D frameset as delivered by the SDK callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RgbdFrame {
    /// Color frame timestamp (wall-clock milliseconds).
    pub color_timestamp_ms: f64,

    /// Depth frame timestamp (wall-clock milliseconds).
    pub depth_timestamp_ms: f64,

    /// SDK frame counter for the color stream.
    pub color_frame_number: u64,

    /// SDK frame counter for the depth stream.
    pub depth_frame_number: u64,

    /// Latest color image, kept for the preview writer.
    pub color: Option<ImagePayload>,
}

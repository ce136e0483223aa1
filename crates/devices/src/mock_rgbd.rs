//! Mock RGB-D source.
//!
//! Produces color+depth framesets at a fixed rate and records into the
//! mock bag container through the `BagRecorder` seam, mirroring how
//! the vendor pipeline records while streaming callbacks.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    wall_clock_ms, BagRecorder, FrameCallback, FrameSource, ImagePayload, PixelFormat,
    RecorderError, RgbdFrame,
};
use tracing::{debug, trace};

use crate::mock_bag::MockBagRecorder;

/// Mock RGB-D source configuration.
#[derive(Debug, Clone)]
pub struct MockRgbdConfig {
    /// Frameset frequency (Hz).
    pub frequency_hz: f64,

    /// Color image width.
    pub width: u32,

    /// Color image height.
    pub height: u32,

    /// Never deliver a frameset (liveness-timeout scenarios).
    pub silent: bool,
}

impl Default for MockRgbdConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 60.0,
            width: 64,
            height: 48,
            silent: false,
        }
    }
}

/// Mock RGB-D camera with an attached bag recorder.
pub struct MockRgbdSource {
    name: String,
    config: MockRgbdConfig,
    listening: Arc<AtomicBool>,
    recorder: MockBagRecorder,
}

impl MockRgbdSource {
    pub fn new(name: impl Into<String>, config: MockRgbdConfig) -> Self {
        Self {
            name: name.into(),
            config,
            listening: Arc::new(AtomicBool::new(false)),
            recorder: MockBagRecorder::new(),
        }
    }

    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, MockRgbdConfig::default())
    }

    pub fn silent(name: impl Into<String>) -> Self {
        Self::new(
            name,
            MockRgbdConfig {
                silent: true,
                ..Default::default()
            },
        )
    }

    fn generate_frame(config: &MockRgbdConfig, frame_number: u64) -> RgbdFrame {
        let now_ms = wall_clock_ms();
        let size = (config.width * config.height * 3) as usize;
        // Flat mid-gray frame; content is irrelevant, dimensions are.
        let color = ImagePayload {
            width: config.width,
            height: config.height,
            format: PixelFormat::Rgb8,
            data: Bytes::from(vec![128u8; size]),
        };

        RgbdFrame {
            color_timestamp_ms: now_ms,
            depth_timestamp_ms: now_ms + 0.2,
            color_frame_number: frame_number,
            depth_frame_number: frame_number,
            color: Some(color),
        }
    }
}

impl FrameSource<RgbdFrame> for MockRgbdSource {
    fn device_name(&self) -> &str {
        &self.name
    }

    fn listen(&self, callback: FrameCallback<RgbdFrame>) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let name = self.name.clone();
        let config = self.config.clone();
        let listening = self.listening.clone();
        let recorder = self.recorder.clone();

        let interval = Duration::from_secs_f64(1.0 / config.frequency_hz);

        thread::spawn(move || {
            debug!(
                device = %name,
                frequency_hz = config.frequency_hz,
                silent = config.silent,
                "mock rgbd source started"
            );

            let mut frame_number: u64 = 0;
            while listening.load(Ordering::Relaxed) {
                if config.silent {
                    thread::sleep(Duration::from_millis(10));
                    continue;
                }

                frame_number += 1;
                let frame = Self::generate_frame(&config, frame_number);

                recorder.append(frame.color_frame_number, frame.depth_frame_number);
                callback(frame);
                trace!(device = %name, frame_number, "mock frameset sent");

                thread::sleep(interval);
            }

            debug!(device = %name, frames = frame_number, "mock rgbd source stopped");
        });
    }

    fn stop(&self) {
        self.listening.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

impl BagRecorder for MockRgbdSource {
    fn begin(&self, path: &Path) -> Result<(), RecorderError> {
        self.recorder.begin(path)
    }

    fn append(&self, color_frame_number: u64, depth_frame_number: u64) {
        self.recorder.append(color_frame_number, depth_frame_number);
    }

    fn finish(&self) -> Result<(), RecorderError> {
        self.recorder.finish()
    }
}

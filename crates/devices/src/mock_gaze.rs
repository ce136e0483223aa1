//! Mock eye-tracker source.
//!
//! Generates gaze samples at a fixed rate on a background thread and
//! answers time-synchronization round trips against a simulated device
//! clock, so the calibration path behaves as it would against
//! hardware.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use contracts::{
    CalibrationSample, CalibrationTarget, EyeSample, FrameCallback, FrameSource, GazeSample,
    RecorderError, TimeSyncSource,
};
use tracing::{debug, info, trace};

/// Mock gaze source configuration.
#[derive(Debug, Clone)]
pub struct MockGazeConfig {
    /// Sample frequency (Hz).
    pub frequency_hz: f64,

    /// Simulated device boot offset: the device clock reads this many
    /// microseconds at source creation.
    pub boot_base_us: i64,

    /// Never deliver a frame (liveness-timeout scenarios).
    pub silent: bool,
}

impl Default for MockGazeConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 60.0,
            boot_base_us: 500_000_000,
            silent: false,
        }
    }
}

/// Mock eye tracker.
///
/// Implements the full gaze surface: frame stream, time-sync endpoint
/// and calibration upload.
pub struct MockGazeSource {
    name: String,
    config: MockGazeConfig,
    listening: Arc<AtomicBool>,

    /// Simulated boot instant backing the device-local clock.
    boot: Instant,

    /// Count of calibration blobs applied (diagnostics).
    calibrations_applied: AtomicI64,
}

impl MockGazeSource {
    pub fn new(name: impl Into<String>, config: MockGazeConfig) -> Self {
        Self {
            name: name.into(),
            config,
            listening: Arc::new(AtomicBool::new(false)),
            boot: Instant::now(),
            calibrations_applied: AtomicI64::new(0),
        }
    }

    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, MockGazeConfig::default())
    }

    /// A source that subscribes but never delivers a frame.
    pub fn silent(name: impl Into<String>) -> Self {
        Self::new(
            name,
            MockGazeConfig {
                silent: true,
                ..Default::default()
            },
        )
    }

    /// Device-local monotonic clock (microseconds since simulated
    /// boot).
    fn device_clock_us(&self) -> i64 {
        self.config.boot_base_us + self.boot.elapsed().as_micros() as i64
    }

    fn generate_sample(clock_us: i64, seq: u64) -> GazeSample {
        // Deterministic sweep across the display; validity flips every
        // 30th sample to exercise the tracking accounting.
        let phase = (seq % 60) as f64 / 60.0;
        let tracked = seq % 30 != 0;
        let validity = u8::from(tracked);

        let eye = EyeSample {
            gaze_display: [phase, 1.0 - phase],
            gaze_3d: [phase * 100.0, 50.0, 600.0],
            gaze_validity: validity,
            origin: [30.0, 0.0, 650.0],
            origin_validity: validity,
            pupil_diameter: 3.2,
            pupil_validity: validity,
        };

        GazeSample {
            system_time_us: clock_us,
            device_time_us: clock_us + 12_345,
            left: eye,
            right: eye,
        }
    }
}

impl FrameSource<GazeSample> for MockGazeSource {
    fn device_name(&self) -> &str {
        &self.name
    }

    fn listen(&self, callback: FrameCallback<GazeSample>) {
        // Idempotent: if already listening, don't start again.
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let name = self.name.clone();
        let config = self.config.clone();
        let listening = self.listening.clone();
        let boot = self.boot;
        let boot_base_us = self.config.boot_base_us;

        let interval = Duration::from_secs_f64(1.0 / config.frequency_hz);

        thread::spawn(move || {
            debug!(
                device = %name,
                frequency_hz = config.frequency_hz,
                silent = config.silent,
                "mock gaze source started"
            );

            let mut seq: u64 = 0;
            while listening.load(Ordering::Relaxed) {
                if config.silent {
                    thread::sleep(Duration::from_millis(10));
                    continue;
                }

                let clock_us = boot_base_us + boot.elapsed().as_micros() as i64;
                let sample = Self::generate_sample(clock_us, seq);
                seq += 1;

                callback(sample);
                trace!(device = %name, seq, clock_us, "mock gaze sample sent");

                thread::sleep(interval);
            }

            debug!(device = %name, samples = seq, "mock gaze source stopped");
        });
    }

    fn stop(&self) {
        self.listening.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

impl TimeSyncSource for MockGazeSource {
    fn sample(&self) -> Option<CalibrationSample> {
        let request = self.device_clock_us();
        let device = request + 12_345;
        // A round trip against hardware costs a few hundred
        // microseconds; simulate the asymmetry.
        let response = request + 400;

        Some(CalibrationSample {
            system_request_us: request,
            device_us: device,
            system_response_us: response,
        })
    }
}

impl CalibrationTarget for MockGazeSource {
    fn apply_calibration(&self, blob: &[u8]) -> Result<(), RecorderError> {
        if blob.is_empty() {
            return Err(RecorderError::device_setup(
                &self.name,
                "calibration blob is empty",
            ));
        }

        self.calibrations_applied.fetch_add(1, Ordering::Relaxed);
        info!(device = %self.name, bytes = blob.len(), "calibration blob applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU64;

    use super::*;

    #[test]
    fn test_mock_gaze_delivers_samples() {
        let source = MockGazeSource::new(
            "gaze",
            MockGazeConfig {
                frequency_hz: 200.0,
                ..Default::default()
            },
        );

        let count = Arc::new(AtomicU64::new(0));
        let count_clone = count.clone();

        source.listen(Arc::new(move |sample: GazeSample| {
            assert!(sample.system_time_us >= 500_000_000);
            count_clone.fetch_add(1, Ordering::Relaxed);
        }));

        thread::sleep(Duration::from_millis(100));
        source.stop();

        assert!(count.load(Ordering::Relaxed) > 0);
        assert!(!source.is_listening());
    }

    #[test]
    fn test_silent_source_never_delivers() {
        let source = MockGazeSource::silent("gaze");

        let count = Arc::new(AtomicU64::new(0));
        let count_clone = count.clone();
        source.listen(Arc::new(move |_| {
            count_clone.fetch_add(1, Ordering::Relaxed);
        }));

        thread::sleep(Duration::from_millis(50));
        source.stop();

        assert_eq!(count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_listen_is_idempotent() {
        let source = MockGazeSource::with_defaults("gaze");

        let count = Arc::new(AtomicU64::new(0));
        let count1 = count.clone();
        let count2 = count.clone();

        source.listen(Arc::new(move |_| {
            count1.fetch_add(1, Ordering::Relaxed);
        }));
        // Second call must be ignored.
        source.listen(Arc::new(move |_| {
            count2.fetch_add(1000, Ordering::Relaxed);
        }));

        thread::sleep(Duration::from_millis(80));
        source.stop();

        let total = count.load(Ordering::Relaxed);
        assert!(total > 0);
        assert!(total < 1000);
    }

    #[test]
    fn test_time_sync_round_trip_is_ordered() {
        let source = MockGazeSource::with_defaults("gaze");
        let sample = source.sample().unwrap();
        assert!(sample.system_response_us > sample.system_request_us);
    }

    #[test]
    fn test_empty_calibration_blob_rejected() {
        let source = MockGazeSource::with_defaults("gaze");
        assert!(source.apply_calibration(&[]).is_err());
        assert!(source.apply_calibration(&[1, 2, 3]).is_ok());
    }
}

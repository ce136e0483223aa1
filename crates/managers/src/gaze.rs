//! Gaze device manager.

use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use brokers::{BrokerWorker, GazeCsvWriter};
use calibration::{CalibrationSampler, TimestampCalibrator};
use contracts::{
    Captured, DeviceManager, GazeSample, GazeSource, PhaseFlags, RecorderConfig, RecorderError,
};
use observability::{DeviceMonitor, MonitorLog};
use ring_buffer::SpscRing;
use tracing::{debug, info, warn};
use verifier::{GazeChecker, GazeVerifier};

use crate::{CaptureTap, DEFAULT_WARMUP_TIMEOUT, GAZE_RING_CAPACITY};

const DEVICE: &str = "gaze";

/// Narrows the gaze source to its time-sync endpoint for the sampler.
struct SyncEndpoint(Arc<dyn GazeSource>);

impl contracts::TimeSyncSource for SyncEndpoint {
    fn sample(&self) -> Option<contracts::CalibrationSample> {
        self.0.sample()
    }
}

#[derive(Default)]
struct GazeComponents {
    monitor: Option<Arc<DeviceMonitor>>,
    ring: Option<Arc<SpscRing<Captured<GazeSample>>>>,
    tap: Option<Arc<CaptureTap<GazeSample>>>,
    writer: Option<GazeCsvWriter>,
    broker: Option<BrokerWorker>,
    sampler: Option<CalibrationSampler>,
}

/// Owns the eye tracker's pipeline: source, tap, 2048-slot ring,
/// broker, calibrator and monitor.
pub struct GazeManager {
    config: RecorderConfig,
    source: Arc<dyn GazeSource>,
    calibrator: Arc<TimestampCalibrator>,
    phases: PhaseFlags,
    warmup_timeout: Duration,
    components: Mutex<GazeComponents>,
}

impl GazeManager {
    pub fn new(config: RecorderConfig, source: Arc<dyn GazeSource>) -> Self {
        Self {
            config,
            source,
            calibrator: Arc::new(TimestampCalibrator::new()),
            phases: PhaseFlags::new(),
            warmup_timeout: DEFAULT_WARMUP_TIMEOUT,
            components: Mutex::new(GazeComponents::default()),
        }
    }

    /// Override the first-frame liveness window (tests).
    pub fn with_warmup_timeout(mut self, timeout: Duration) -> Self {
        self.warmup_timeout = timeout;
        self
    }

    pub fn calibrator(&self) -> &Arc<TimestampCalibrator> {
        &self.calibrator
    }

    /// Load and push the optional calibration blob into the device.
    fn apply_calibration_blob(&self) -> Result<(), RecorderError> {
        let Some(path) = &self.config.calibration_path else {
            return Ok(());
        };
        if !path.exists() {
            debug!(path = %path.display(), "no calibration blob, skipping");
            return Ok(());
        }

        let blob = fs::read(path)?;
        if blob.is_empty() {
            warn!(path = %path.display(), "calibration blob is empty, skipping");
            return Ok(());
        }

        self.source.apply_calibration(&blob)
    }
}

impl DeviceManager for GazeManager {
    fn name(&self) -> &str {
        DEVICE
    }

    fn setup(&self) -> Result<(), RecorderError> {
        let mut components = self.components.lock().expect("gaze components poisoned");

        let log = MonitorLog::create(&self.config.output_path, "gaze_monitor")?;
        let monitor = Arc::new(DeviceMonitor::new(DEVICE, Some(log)));

        let overflow_monitor = monitor.clone();
        let ring = Arc::new(
            SpscRing::new(GAZE_RING_CAPACITY)
                .with_overflow_hook(move || overflow_monitor.on_overflow()),
        );

        let calibrator = self.calibrator.clone();
        let tap = CaptureTap::new(
            ring.clone(),
            monitor.clone(),
            Box::new(move |sample: &GazeSample, arrival_ms| {
                if calibrator.is_ready() {
                    (arrival_ms - calibrator.to_global_ms(sample.system_time_us)).max(0.0)
                } else {
                    0.0
                }
            }),
        );

        let writer = GazeCsvWriter::create(
            &self.config.device_dir(DEVICE),
            self.calibrator.clone(),
            monitor.clone(),
        )?;

        self.apply_calibration_blob()?;

        components.monitor = Some(monitor);
        components.ring = Some(ring);
        components.tap = Some(tap);
        components.writer = Some(writer);

        self.phases.mark_setup();
        info!(device = DEVICE, "setup complete");
        Ok(())
    }

    fn warmup(&self) -> Result<(), RecorderError> {
        let (tap, monitor) = {
            let components = self.components.lock().expect("gaze components poisoned");
            let tap = components.tap.clone().ok_or_else(|| {
                RecorderError::device_setup(DEVICE, "warmup before setup")
            })?;
            (tap, components.monitor.clone())
        };

        if let Some(monitor) = &monitor {
            monitor.clone().start_periodic();
        }

        let callback_tap = tap.clone();
        self.source
            .listen(Arc::new(move |sample| callback_tap.handle(sample)));

        // Clock calibration runs from warmup until stop.
        {
            let mut components = self.components.lock().expect("gaze components poisoned");
            components.sampler = Some(CalibrationSampler::spawn(
                Arc::new(SyncEndpoint(self.source.clone())),
                self.calibrator.clone(),
            ));
        }

        tap.wait_first_frame(self.warmup_timeout)
            .map_err(|waited| RecorderError::WarmupTimeout {
                device: DEVICE.into(),
                waited_ms: waited.as_millis() as u64,
            })?;

        self.phases.mark_warmup();
        info!(device = DEVICE, "warmup complete, first frame observed");
        Ok(())
    }

    fn start(&self) -> Result<(), RecorderError> {
        let mut components = self.components.lock().expect("gaze components poisoned");

        let ring = components
            .ring
            .clone()
            .ok_or_else(|| RecorderError::device_setup(DEVICE, "start before setup"))?;
        let writer = components
            .writer
            .take()
            .ok_or_else(|| RecorderError::device_setup(DEVICE, "start before setup"))?;

        ring.open();
        components.broker = Some(BrokerWorker::spawn(DEVICE, ring, writer));

        if let Some(monitor) = &components.monitor {
            monitor.on_recording_start();
        }

        self.phases.mark_running();
        info!(device = DEVICE, "recording started");
        Ok(())
    }

    fn stop(&self) -> Result<(), RecorderError> {
        let mut components = self.components.lock().expect("gaze components poisoned");

        // Reverse dependency order: drain consumer, close the gate,
        // stop the SDK stream, then the auxiliary threads.
        if let Some(mut broker) = components.broker.take() {
            broker.stop();
        }
        if let Some(ring) = &components.ring {
            ring.close();
        }
        self.source.stop();

        if let Some(mut sampler) = components.sampler.take() {
            sampler.stop();
        }
        if let Some(monitor) = &components.monitor {
            let summary = monitor.on_recording_stop();
            info!(
                device = DEVICE,
                frames = summary.frames_received,
                overflows = summary.queue_overflows,
                verdict = %summary.verdict,
                "recording stopped"
            );
            monitor.stop_periodic();
        }

        self.phases.mark_stopped();
        Ok(())
    }

    fn cleanup(&self) -> Result<(), RecorderError> {
        let mut components = self.components.lock().expect("gaze components poisoned");

        // The broker flushed the CSV when it stopped; whatever is
        // still here is released now.
        if let Some(writer) = components.writer.take() {
            drop(writer);
        }
        components.tap = None;
        components.ring = None;
        components.monitor = None;

        info!(device = DEVICE, "cleanup complete");
        Ok(())
    }

    fn check(&self) -> Result<bool, RecorderError> {
        GazeChecker::new(self.config.clone()).check()
    }

    fn verify(&self) -> Result<bool, RecorderError> {
        GazeVerifier::new(self.config.clone()).verify()
    }

    fn phases(&self) -> &PhaseFlags {
        &self.phases
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use devices::MockGazeSource;

    use super::*;

    fn config_at(root: &std::path::Path) -> RecorderConfig {
        RecorderConfig {
            output_path: root.to_path_buf(),
            verified_path: root.join("verified"),
            calibration_path: None,
            record_duration: 1,
        }
    }

    #[test]
    fn test_full_lifecycle_writes_csv_rows() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockGazeSource::with_defaults(DEVICE));
        let manager = GazeManager::new(config_at(dir.path()), source);

        manager.setup().unwrap();
        assert!(manager.phases().is_setup());

        manager.warmup().unwrap();
        assert!(manager.phases().is_warmup());

        manager.start().unwrap();
        assert!(manager.phases().is_running());

        thread::sleep(Duration::from_millis(400));

        manager.stop().unwrap();
        assert!(!manager.phases().is_running());
        manager.cleanup().unwrap();

        let csv = std::fs::read_to_string(dir.path().join("gaze/gaze_data.csv")).unwrap();
        let rows = csv.lines().count() - 1;
        assert!(rows > 0, "expected data rows, got none");

        // index column is gap-free from zero
        for (i, line) in csv.lines().skip(1).enumerate() {
            assert!(line.starts_with(&format!("{i},")));
        }
    }

    #[test]
    fn test_warmup_timeout_on_silent_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockGazeSource::silent(DEVICE));
        let manager = GazeManager::new(config_at(dir.path()), source)
            .with_warmup_timeout(Duration::from_millis(200));

        manager.setup().unwrap();
        let err = manager.warmup().unwrap_err();
        assert!(matches!(err, RecorderError::WarmupTimeout { .. }));
        assert!(!manager.phases().is_warmup());

        // Teardown still works from the partial state.
        manager.stop().unwrap();
        manager.cleanup().unwrap();
    }

    #[test]
    fn test_stop_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockGazeSource::with_defaults(DEVICE));
        let manager = GazeManager::new(config_at(dir.path()), source);

        manager.setup().unwrap();
        manager.warmup().unwrap();
        manager.start().unwrap();

        manager.stop().unwrap();
        manager.stop().unwrap();
        manager.cleanup().unwrap();
        manager.cleanup().unwrap();
    }

    #[test]
    fn test_start_before_setup_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockGazeSource::with_defaults(DEVICE));
        let manager = GazeManager::new(config_at(dir.path()), source);

        assert!(manager.start().is_err());
    }

    #[test]
    fn test_calibrated_timestamps_land_on_wall_clock() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockGazeSource::with_defaults(DEVICE));
        let manager = GazeManager::new(config_at(dir.path()), source);

        manager.setup().unwrap();
        manager.warmup().unwrap();
        manager.start().unwrap();
        thread::sleep(Duration::from_millis(300));
        manager.stop().unwrap();
        manager.cleanup().unwrap();

        assert!(manager.calibrator().is_ready());

        let csv = std::fs::read_to_string(dir.path().join("gaze/gaze_data.csv")).unwrap();
        let first_row = csv.lines().nth(1).unwrap();
        let ts_ms: f64 = first_row.split(',').nth(1).unwrap().parse().unwrap();
        let wall = contracts::wall_clock_ms();
        assert!(
            (wall - ts_ms).abs() < 60_000.0,
            "timestamp {ts_ms} not near wall clock {wall}"
        );
    }
}

//! RGB-D device manager.

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use brokers::{BrokerWorker, PreviewSlot, PreviewWriter, RgbdCsvWriter};
use contracts::{
    BagProbe, Captured, DeviceManager, PhaseFlags, RecorderConfig, RecorderError, RgbdFrame,
    RgbdSource,
};
use observability::{DeviceMonitor, MonitorLog};
use ring_buffer::SpscRing;
use tracing::{info, warn};
use verifier::{RgbdChecker, RgbdVerifier};

use crate::{CaptureTap, DEFAULT_WARMUP_TIMEOUT, RGBD_RING_CAPACITY};

const DEVICE: &str = "rgbd";

#[derive(Default)]
struct RgbdComponents {
    monitor: Option<Arc<DeviceMonitor>>,
    ring: Option<Arc<SpscRing<Captured<RgbdFrame>>>>,
    tap: Option<Arc<CaptureTap<RgbdFrame>>>,
    writer: Option<RgbdCsvWriter>,
    broker: Option<BrokerWorker>,
    preview: Option<PreviewWriter>,
    recording: bool,
}

/// Owns the RGB-D camera's pipeline: source, tap, 1024-slot ring,
/// broker with preview thread, bag recorder and monitor.
pub struct RgbdManager {
    config: RecorderConfig,
    source: Arc<dyn RgbdSource>,
    probe: Arc<dyn BagProbe>,
    phases: PhaseFlags,
    warmup_timeout: Duration,
    preview_enabled: bool,
    components: Mutex<RgbdComponents>,
}

impl RgbdManager {
    pub fn new(
        config: RecorderConfig,
        source: Arc<dyn RgbdSource>,
        probe: Arc<dyn BagProbe>,
    ) -> Self {
        Self {
            config,
            source,
            probe,
            phases: PhaseFlags::new(),
            warmup_timeout: DEFAULT_WARMUP_TIMEOUT,
            preview_enabled: true,
            components: Mutex::new(RgbdComponents::default()),
        }
    }

    /// Override the first-frame liveness window (tests).
    pub fn with_warmup_timeout(mut self, timeout: Duration) -> Self {
        self.warmup_timeout = timeout;
        self
    }

    /// Disable the 1 Hz preview image thread.
    pub fn without_preview(mut self) -> Self {
        self.preview_enabled = false;
        self
    }
}

impl DeviceManager for RgbdManager {
    fn name(&self) -> &str {
        DEVICE
    }

    fn setup(&self) -> Result<(), RecorderError> {
        let mut components = self.components.lock().expect("rgbd components poisoned");

        let log = MonitorLog::create(&self.config.output_path, "rgbd_monitor")?;
        let monitor = Arc::new(DeviceMonitor::new(DEVICE, Some(log)));

        let overflow_monitor = monitor.clone();
        let ring = Arc::new(
            SpscRing::new(RGBD_RING_CAPACITY)
                .with_overflow_hook(move || overflow_monitor.on_overflow()),
        );

        let tap = CaptureTap::new(
            ring.clone(),
            monitor.clone(),
            Box::new(|frame: &RgbdFrame, arrival_ms| {
                (arrival_ms - frame.color_timestamp_ms).max(0.0)
            }),
        );

        let device_dir = self.config.device_dir(DEVICE);
        let preview_slot = self.preview_enabled.then(PreviewSlot::new);
        let writer = RgbdCsvWriter::create(&device_dir, monitor.clone(), preview_slot.clone())?;

        if let Some(slot) = preview_slot {
            components.preview = Some(PreviewWriter::spawn(&device_dir, slot));
        }

        // The bag carries a unique epoch-second name.
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.source.begin(&device_dir.join(format!("{unique}.bag")))?;
        components.recording = true;

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
            let components = self.components.lock().expect("rgbd components poisoned");
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
            .listen(Arc::new(move |frame| callback_tap.handle(frame)));

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
        let mut components = self.components.lock().expect("rgbd components poisoned");

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
        let mut components = self.components.lock().expect("rgbd components poisoned");

        // Reverse dependency order; sub-step failures degrade the
        // teardown but do not leave threads running.
        if let Some(mut broker) = components.broker.take() {
            broker.stop();
        }
        if let Some(ring) = &components.ring {
            ring.close();
        }
        if let Some(mut preview) = components.preview.take() {
            preview.stop();
        }
        self.source.stop();

        let mut degraded = false;
        if components.recording {
            components.recording = false;
            if let Err(e) = self.source.finish() {
                warn!(device = DEVICE, error = %e, "bag finish failed, continuing teardown");
                degraded = true;
            }
        }

        if let Some(monitor) = &components.monitor {
            let summary = monitor.on_recording_stop();
            info!(
                device = DEVICE,
                frames = summary.frames_received,
                overflows = summary.queue_overflows,
                degraded,
                verdict = %summary.verdict,
                "recording stopped"
            );
            monitor.stop_periodic();
        }

        self.phases.mark_stopped();
        Ok(())
    }

    fn cleanup(&self) -> Result<(), RecorderError> {
        let mut components = self.components.lock().expect("rgbd components poisoned");

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
        RgbdChecker::new(self.config.clone(), self.probe.clone()).check()
    }

    fn verify(&self) -> Result<bool, RecorderError> {
        RgbdVerifier::new(self.config.clone(), self.probe.clone()).verify()
    }

    fn phases(&self) -> &PhaseFlags {
        &self.phases
    }
}

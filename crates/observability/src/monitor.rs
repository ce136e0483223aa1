//! Per-device capture monitor.
//!
//! The producer callback reports frames and overflows through atomic
//! counters; the only lock guards the latency aggregate and sample
//! window together and is held for a push only. On recording stop the
//! monitor logs session duration and effective frame rate, computes
//! latency percentiles over the last (up to) 1000 samples, and grades
//! the session.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::{MonitorLog, RunningStats};

/// Inter-frame gap above which a drop is assumed.
const DROP_GAP_MS: f64 = 50.0;

/// Latency samples retained for percentile analysis.
const LATENCY_HISTORY_CAP: usize = 1000;

/// Periodic STATS line cadence, in 1 s ticks.
const STATS_EVERY_TICKS: u64 = 30;

/// Frame classification for per-kind counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Color,
    Depth,
    Gaze,
}

/// Session quality grade derived from drop rate, overflow count and
/// error count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityVerdict {
    Excellent,
    Good,
    Acceptable,
    Poor,
}

impl std::fmt::Display for QualityVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Excellent => "EXCELLENT",
            Self::Good => "GOOD",
            Self::Acceptable => "ACCEPTABLE",
            Self::Poor => "POOR",
        };
        f.write_str(s)
    }
}

/// Snapshot emitted by [`DeviceMonitor::summary`].
#[derive(Debug, Clone)]
pub struct MonitorSummary {
    pub frames_received: u64,
    pub errors: u64,
    pub frame_drops: u64,
    pub queue_overflows: u64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    pub avg_latency_ms: f64,
    pub std_dev_latency_ms: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub verdict: QualityVerdict,
}

/// Latency aggregate plus the bounded sample window for percentiles,
/// updated together under one lock held only for the push.
#[derive(Default)]
struct LatencyTrack {
    stats: RunningStats,
    history: Vec<f64>,
}

/// Per-device metrics sink. Counters are lock-free atomics; latency
/// tracking shares the single history mutex.
pub struct DeviceMonitor {
    name: String,
    log: Option<MonitorLog>,

    frames_received: AtomicU64,
    errors: AtomicU64,
    frame_drops: AtomicU64,
    queue_overflows: AtomicU64,

    color_frames: AtomicU64,
    depth_frames: AtomicU64,
    gaze_frames: AtomicU64,

    // Previous arrival wall-clock, stored as f64 bits.
    last_arrival_bits: AtomicU64,

    latency: Mutex<LatencyTrack>,

    recording_started: Mutex<Option<Instant>>,

    periodic_running: AtomicBool,
    periodic_handle: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceMonitor {
    pub fn new(name: impl Into<String>, log: Option<MonitorLog>) -> Self {
        Self {
            name: name.into(),
            log,
            frames_received: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            frame_drops: AtomicU64::new(0),
            queue_overflows: AtomicU64::new(0),
            color_frames: AtomicU64::new(0),
            depth_frames: AtomicU64::new(0),
            gaze_frames: AtomicU64::new(0),
            last_arrival_bits: AtomicU64::new(0),
            latency: Mutex::new(LatencyTrack {
                stats: RunningStats::default(),
                history: Vec::with_capacity(LATENCY_HISTORY_CAP),
            }),
            recording_started: Mutex::new(None),
            periodic_running: AtomicBool::new(false),
            periodic_handle: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Report one frame arrival. Called on the producer thread.
    pub fn on_frame(&self, arrival_ms: f64, latency_ms: f64) {
        let n = self.frames_received.fetch_add(1, Ordering::Relaxed) + 1;

        // Gap-based drop detection against the previous arrival.
        let prev_bits = self.last_arrival_bits.swap(arrival_ms.to_bits(), Ordering::Relaxed);
        if prev_bits != 0 {
            let gap = arrival_ms - f64::from_bits(prev_bits);
            if gap > DROP_GAP_MS {
                self.frame_drops.fetch_add(1, Ordering::Relaxed);
                self.log_event("FRAME_DROP_DETECTED", &format!("Gap of {gap:.0}ms detected"));
            }
        }

        {
            let mut latency = self.latency.lock().expect("latency track poisoned");
            latency.stats.push(latency_ms);
            if latency.history.len() == LATENCY_HISTORY_CAP {
                latency.history.remove(0);
            }
            latency.history.push(latency_ms);
        }

        if n % 100 == 0 {
            self.log_event(
                "FRAME",
                &format!("count={n}, arrival={arrival_ms:.3}ms, latency={latency_ms:.3}ms"),
            );
        }
    }

    /// Bump the per-kind counter.
    pub fn on_frame_kind(&self, kind: FrameKind) {
        let counter = match kind {
            FrameKind::Color => &self.color_frames,
            FrameKind::Depth => &self.depth_frames,
            FrameKind::Gaze => &self.gaze_frames,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Report a recoverable error.
    pub fn on_error(&self, message: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        warn!(device = %self.name, message, "device error reported");
        self.log_event("ERROR", message);
    }

    /// Report a rejected-full enqueue.
    pub fn on_overflow(&self) {
        self.queue_overflows.fetch_add(1, Ordering::Relaxed);
        self.log_event("QUEUE_OVERFLOW", "Frame queue overflow detected");
    }

    pub fn on_recording_start(&self) {
        *self.recording_started.lock().expect("recording start poisoned") = Some(Instant::now());
        self.log_event("RECORDING_STARTED", "Recording session initiated");
    }

    /// Close the session: writes the recording analysis and returns
    /// the summary.
    pub fn on_recording_stop(&self) -> MonitorSummary {
        self.log_event("RECORDING_STOPPED", "Recording session ended");

        let duration_ms = self
            .recording_started
            .lock()
            .expect("recording start poisoned")
            .take()
            .map(|started| started.elapsed().as_secs_f64() * 1000.0);

        let summary = self.summary();
        self.write_analysis(&summary, duration_ms);
        summary
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn frame_drops(&self) -> u64 {
        self.frame_drops.load(Ordering::Relaxed)
    }

    pub fn queue_overflows(&self) -> u64 {
        self.queue_overflows.load(Ordering::Relaxed)
    }

    /// Compute the current summary with percentiles over the retained
    /// history.
    pub fn summary(&self) -> MonitorSummary {
        let frames = self.frames_received.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let drops = self.frame_drops.load(Ordering::Relaxed);
        let overflows = self.queue_overflows.load(Ordering::Relaxed);

        let (min, max, avg, std_dev, p50, p95, p99) = {
            let latency = self.latency.lock().expect("latency track poisoned");
            let (p50, p95, p99) = percentiles(&latency.history);
            (
                latency.stats.min(),
                latency.stats.max(),
                latency.stats.mean(),
                latency.stats.std_dev(),
                p50,
                p95,
                p99,
            )
        };

        let drop_rate = if frames > 0 {
            drops as f64 / frames as f64 * 100.0
        } else {
            0.0
        };

        let verdict = if drop_rate < 1.0 && overflows == 0 && errors == 0 {
            QualityVerdict::Excellent
        } else if drop_rate < 5.0 && overflows < 10 {
            QualityVerdict::Good
        } else if drop_rate < 10.0 {
            QualityVerdict::Acceptable
        } else {
            QualityVerdict::Poor
        };

        MonitorSummary {
            frames_received: frames,
            errors,
            frame_drops: drops,
            queue_overflows: overflows,
            min_latency_ms: min,
            max_latency_ms: max,
            avg_latency_ms: avg,
            std_dev_latency_ms: std_dev,
            p50_latency_ms: p50,
            p95_latency_ms: p95,
            p99_latency_ms: p99,
            verdict,
        }
    }

    /// Spawn the 1 s periodic stats thread.
    pub fn start_periodic(self: Arc<Self>) {
        if self.periodic_running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.log_line(&format!("=== {} MONITOR STARTED ===", self.name.to_uppercase()));

        let monitor = Arc::clone(&self);
        let handle = thread::Builder::new()
            .name(format!("{}-monitor", self.name))
            .spawn(move || {
                let mut tick: u64 = 0;
                'outer: while monitor.periodic_running.load(Ordering::Relaxed) {
                    // 1 s tick, woken early on stop.
                    for _ in 0..10 {
                        if !monitor.periodic_running.load(Ordering::Relaxed) {
                            break 'outer;
                        }
                        thread::sleep(Duration::from_millis(100));
                    }
                    tick += 1;
                    if tick % STATS_EVERY_TICKS == 0 {
                        let s = monitor.summary();
                        monitor.log_event(
                            "STATS",
                            &format!(
                                "frames={}, errors={}, drops={}, overflows={}, avg_latency={:.2}ms",
                                s.frames_received,
                                s.errors,
                                s.frame_drops,
                                s.queue_overflows,
                                s.avg_latency_ms
                            ),
                        );
                    }
                }
            })
            .expect("failed to spawn monitor thread");

        *self.periodic_handle.lock().expect("monitor handle poisoned") = Some(handle);
        debug!(device = %self.name, "periodic monitor started");
    }

    /// Stop and join the periodic thread. Idempotent.
    pub fn stop_periodic(&self) {
        if !self.periodic_running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.periodic_handle.lock().expect("monitor handle poisoned").take()
        {
            let _ = handle.join();
        }
        debug!(device = %self.name, "periodic monitor stopped");
    }

    fn write_analysis(&self, s: &MonitorSummary, duration_ms: Option<f64>) {
        self.log_line("=== RECORDING ANALYSIS ===");
        if let Some(duration_ms) = duration_ms {
            self.log_event("RECORDING_DURATION_MS", &format!("{duration_ms:.0}"));
        }
        self.log_event("TOTAL_FRAMES", &s.frames_received.to_string());
        if let Some(duration_ms) = duration_ms {
            if duration_ms > 0.0 {
                let fps = s.frames_received as f64 / (duration_ms / 1000.0);
                self.log_event("EFFECTIVE_FPS", &format!("{fps:.2}"));
            }
        }
        self.log_event(
            "FRAMES_BY_KIND",
            &format!(
                "color={}, depth={}, gaze={}",
                self.color_frames.load(Ordering::Relaxed),
                self.depth_frames.load(Ordering::Relaxed),
                self.gaze_frames.load(Ordering::Relaxed)
            ),
        );
        self.log_event("FRAME_DROPS", &s.frame_drops.to_string());
        self.log_event("QUEUE_OVERFLOWS", &s.queue_overflows.to_string());
        self.log_event("ERRORS", &s.errors.to_string());
        self.log_event(
            "LATENCY",
            &format!(
                "min={:.2}ms, max={:.2}ms, avg={:.2}ms, std={:.2}ms",
                s.min_latency_ms, s.max_latency_ms, s.avg_latency_ms, s.std_dev_latency_ms
            ),
        );
        self.log_event(
            "LATENCY_PERCENTILES",
            &format!(
                "p50={:.2}ms, p95={:.2}ms, p99={:.2}ms",
                s.p50_latency_ms, s.p95_latency_ms, s.p99_latency_ms
            ),
        );
        self.log_event("RECORDING_QUALITY", &s.verdict.to_string());
    }

    fn log_event(&self, event: &str, details: &str) {
        if let Some(log) = &self.log {
            log.event(event, details);
        }
    }

    fn log_line(&self, line: &str) {
        if let Some(log) = &self.log {
            log.line(line);
        }
    }
}

impl Drop for DeviceMonitor {
    fn drop(&mut self) {
        self.stop_periodic();
    }
}

fn percentiles(history: &[f64]) -> (f64, f64, f64) {
    if history.is_empty() {
        return (0.0, 0.0, 0.0);
    }

    let mut sorted = history.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let pick = |q: f64| {
        let idx = ((sorted.len() as f64 * q) as usize).min(sorted.len() - 1);
        sorted[idx]
    };

    (pick(0.5), pick(0.95), pick(0.99))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let monitor = DeviceMonitor::new("rgbd", None);

        monitor.on_frame(1000.0, 2.0);
        monitor.on_frame(1016.0, 3.0);
        monitor.on_error("stream hiccup");
        monitor.on_overflow();
        monitor.on_frame_kind(FrameKind::Color);
        monitor.on_frame_kind(FrameKind::Depth);

        assert_eq!(monitor.frames_received(), 2);
        assert_eq!(monitor.errors(), 1);
        assert_eq!(monitor.queue_overflows(), 1);
    }

    #[test]
    fn test_gap_detection_counts_drops() {
        let monitor = DeviceMonitor::new("rgbd", None);

        monitor.on_frame(1000.0, 1.0);
        monitor.on_frame(1016.7, 1.0); // normal 60 Hz spacing
        monitor.on_frame(1120.0, 1.0); // 103ms gap -> drop
        monitor.on_frame(1136.7, 1.0);

        assert_eq!(monitor.frame_drops(), 1);
    }

    #[test]
    fn test_latency_extremes_and_percentiles() {
        let monitor = DeviceMonitor::new("gaze", None);

        for i in 1..=100 {
            monitor.on_frame(1000.0 + i as f64 * 16.0, i as f64);
        }

        let s = monitor.summary();
        assert_eq!(s.min_latency_ms, 1.0);
        assert_eq!(s.max_latency_ms, 100.0);
        assert!((s.avg_latency_ms - 50.5).abs() < 1e-9);
        assert!(s.std_dev_latency_ms > 0.0);
        assert!(s.p50_latency_ms >= 50.0 && s.p50_latency_ms <= 52.0);
        assert!(s.p95_latency_ms >= 95.0);
        assert!(s.p99_latency_ms >= 99.0);
    }

    #[test]
    fn test_history_is_bounded_while_stats_see_everything() {
        let monitor = DeviceMonitor::new("gaze", None);
        for i in 0..2000 {
            monitor.on_frame(1000.0 + i as f64, 1.0);
        }
        let latency = monitor.latency.lock().unwrap();
        assert_eq!(latency.history.len(), LATENCY_HISTORY_CAP);
        assert_eq!(latency.stats.count(), 2000);
    }

    #[test]
    fn test_clean_session_is_excellent() {
        let monitor = DeviceMonitor::new("rgbd", None);
        for i in 0..100 {
            monitor.on_frame(1000.0 + i as f64 * 16.0, 2.0);
        }
        assert_eq!(monitor.summary().verdict, QualityVerdict::Excellent);
    }

    #[test]
    fn test_overflowing_session_degrades() {
        let monitor = DeviceMonitor::new("rgbd", None);
        for i in 0..100 {
            monitor.on_frame(1000.0 + i as f64 * 16.0, 2.0);
        }
        for _ in 0..5 {
            monitor.on_overflow();
        }
        assert_eq!(monitor.summary().verdict, QualityVerdict::Good);
    }

    #[test]
    fn test_heavy_drops_are_poor() {
        let monitor = DeviceMonitor::new("rgbd", None);
        // Every other frame 100ms late: 50% drop rate.
        let mut t = 1000.0;
        for i in 0..40 {
            t += if i % 2 == 0 { 100.0 } else { 16.0 };
            monitor.on_frame(t, 2.0);
        }
        assert_eq!(monitor.summary().verdict, QualityVerdict::Poor);
    }

    #[test]
    fn test_analysis_written_on_stop() {
        let dir = tempfile::tempdir().unwrap();
        let log = MonitorLog::create(dir.path(), "rgbd_monitor").unwrap();
        let path = log.path().to_path_buf();

        let monitor = DeviceMonitor::new("rgbd", Some(log));
        monitor.on_recording_start();
        monitor.on_frame(1000.0, 2.0);
        std::thread::sleep(Duration::from_millis(20));
        monitor.on_recording_stop();

        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("RECORDING_STARTED"));
        assert!(content.contains("RECORDING_STOPPED"));
        assert!(content.contains("RECORDING_DURATION_MS"));
        assert!(content.contains("EFFECTIVE_FPS"));
        assert!(content.contains("RECORDING_QUALITY: EXCELLENT"));
    }

    #[test]
    fn test_stop_without_start_omits_duration_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = MonitorLog::create(dir.path(), "gaze_monitor").unwrap();
        let path = log.path().to_path_buf();

        let monitor = DeviceMonitor::new("gaze", Some(log));
        monitor.on_frame(1000.0, 2.0);
        monitor.on_recording_stop();

        let content = std::fs::read_to_string(path).unwrap();
        assert!(!content.contains("RECORDING_DURATION_MS"));
        assert!(!content.contains("EFFECTIVE_FPS"));
        assert!(content.contains("RECORDING_QUALITY"));
    }
}

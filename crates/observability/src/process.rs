//! Host process metrics log.
//!
//! The actual OS collector is an external collaborator; this module
//! owns only the seam and the `cpu_ram_monitor_<epoch>.log` sink it
//! feeds.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::MonitorLog;

/// One host metrics reading.
#[derive(Debug, Clone, Copy)]
pub struct ProcessSample {
    pub cpu_percent: f64,
    pub rss_mb: f64,
}

/// Supplier of host metrics readings. Implemented outside the
/// workspace; `None` means the reading is unavailable this tick.
pub trait ProcessMetricsSource: Send + Sync {
    fn sample(&self) -> Option<ProcessSample>;
}

/// Source that never has a reading; uptime lines are still logged.
pub struct NullProcessMetrics;

impl ProcessMetricsSource for NullProcessMetrics {
    fn sample(&self) -> Option<ProcessSample> {
        None
    }
}

/// Writes one line per second to `cpu_ram_monitor_<epoch>.log`.
pub struct SystemMonitor {
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SystemMonitor {
    /// Start logging into `<output_root>/cpu_ram_monitor_<epoch>.log`.
    pub fn start(
        output_root: &Path,
        source: Arc<dyn ProcessMetricsSource>,
    ) -> std::io::Result<Self> {
        let log = MonitorLog::create(output_root, "cpu_ram_monitor")?;
        log.line("=== SYSTEM MONITOR STARTED ===");

        let running = Arc::new(AtomicBool::new(true));
        let running_flag = running.clone();

        let handle = thread::Builder::new()
            .name("system-monitor".into())
            .spawn(move || {
                let started = Instant::now();
                'outer: while running_flag.load(Ordering::Relaxed) {
                    // 1 s tick, woken early on stop.
                    for _ in 0..10 {
                        if !running_flag.load(Ordering::Relaxed) {
                            break 'outer;
                        }
                        thread::sleep(Duration::from_millis(100));
                    }
                    let uptime = started.elapsed().as_secs();
                    match source.sample() {
                        Some(s) => log.event(
                            "SYSTEM",
                            &format!(
                                "uptime={}s, cpu={:.1}%, rss={:.1}MB",
                                uptime, s.cpu_percent, s.rss_mb
                            ),
                        ),
                        None => log.event("SYSTEM", &format!("uptime={uptime}s")),
                    }
                }
                log.line("=== SYSTEM MONITOR STOPPED ===");
            })
            .expect("failed to spawn system monitor");

        debug!("system monitor started");
        Ok(Self {
            running,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Stop and join. Idempotent.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.handle.lock().expect("system monitor poisoned").take() {
            let _ = handle.join();
        }
        debug!("system monitor stopped");
    }
}

impl Drop for SystemMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

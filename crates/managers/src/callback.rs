//! SDK-facing capture tap.
//!
//! The object handed to a `FrameSource` callback. Runs entirely on the
//! producer thread and must not block: it stamps arrival metadata,
//! reports to the monitor, and enqueues into the ring. While the gate
//! is closed (warmup) frames still trip the first-frame flag but are
//! not buffered.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use contracts::{wall_clock_ms, Captured};
use observability::DeviceMonitor;
use ring_buffer::SpscRing;

/// How often the warmup wait re-checks the first-frame flag.
const WAIT_POLL: Duration = Duration::from_millis(5);

/// Derives a frame's capture latency (ms) from its payload and
/// arrival time. Return 0.0 when the payload carries no comparable
/// timestamp.
pub type LatencyFn<T> = Box<dyn Fn(&T, f64) -> f64 + Send + Sync>;

/// Producer-side frame handler shared with the SDK for the duration
/// of the subscription.
pub struct CaptureTap<T> {
    ring: Arc<SpscRing<Captured<T>>>,
    monitor: Arc<DeviceMonitor>,
    latency_fn: LatencyFn<T>,
    first_frame: AtomicBool,
    seq: AtomicU64,
}

impl<T> CaptureTap<T> {
    pub fn new(
        ring: Arc<SpscRing<Captured<T>>>,
        monitor: Arc<DeviceMonitor>,
        latency_fn: LatencyFn<T>,
    ) -> Arc<Self> {
        Arc::new(Self {
            ring,
            monitor,
            latency_fn,
            first_frame: AtomicBool::new(false),
            seq: AtomicU64::new(0),
        })
    }

    /// Handle one frame on the producer thread.
    pub fn handle(&self, payload: T) {
        if !self.first_frame.load(Ordering::Relaxed) {
            self.first_frame.store(true, Ordering::Release);
        }

        let arrival_ms = wall_clock_ms();
        let latency_ms = (self.latency_fn)(&payload, arrival_ms);
        self.monitor.on_frame(arrival_ms, latency_ms);

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        // A closed gate or a full ring rejects silently; overflow
        // accounting happens through the ring's hook.
        let _ = self.ring.enqueue(Captured {
            seq,
            arrival_ms,
            payload,
        });
    }

    pub fn first_frame_received(&self) -> bool {
        self.first_frame.load(Ordering::Acquire)
    }

    /// Block until the first frame arrives or the window elapses;
    /// returns the elapsed wait on timeout.
    pub fn wait_first_frame(&self, timeout: Duration) -> Result<(), Duration> {
        let start = Instant::now();
        while !self.first_frame_received() {
            if start.elapsed() >= timeout {
                return Err(start.elapsed());
            }
            thread::sleep(WAIT_POLL);
        }
        Ok(())
    }
}

//! Broker consumer worker.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ring_buffer::SpscRing;
use tracing::debug;

/// Polling interval while the ring is empty. Bounded polling keeps the
/// consumer responsive to both the producer and cancellation without
/// condition variables.
const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// Serializes records drained from a ring.
pub trait RecordProcessor<T>: Send + 'static {
    /// Handle one record. Must recover from its own errors.
    fn process(&mut self, record: T);

    /// Flush buffered output. Called once when the worker stops.
    fn flush(&mut self);
}

/// Dedicated consumer thread for one device's ring.
pub struct BrokerWorker {
    name: String,
    running: Arc<AtomicBool>,
    processed: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl BrokerWorker {
    /// Spawn the consumer loop: dequeue-process, or sleep 1 ms when
    /// the ring is empty.
    pub fn spawn<T: Send + 'static>(
        name: impl Into<String>,
        ring: Arc<SpscRing<T>>,
        mut processor: impl RecordProcessor<T>,
    ) -> Self {
        let name = name.into();
        let running = Arc::new(AtomicBool::new(true));
        let processed = Arc::new(AtomicU64::new(0));

        let running_flag = running.clone();
        let processed_counter = processed.clone();
        let thread_name = name.clone();

        let handle = thread::Builder::new()
            .name(format!("{name}-broker"))
            .spawn(move || {
                debug!(broker = %thread_name, "broker worker started");

                while running_flag.load(Ordering::Relaxed) {
                    match ring.dequeue() {
                        Some(record) => {
                            processed_counter.fetch_add(1, Ordering::Relaxed);
                            processor.process(record);
                        }
                        None => thread::sleep(IDLE_SLEEP),
                    }
                }

                processor.flush();
                debug!(
                    broker = %thread_name,
                    processed = processed_counter.load(Ordering::Relaxed),
                    "broker worker stopped"
                );
            })
            .expect("failed to spawn broker worker");

        Self {
            name,
            running,
            processed,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records processed so far.
    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Signal the loop and join the thread. Records still in the ring
    /// are abandoned (the gate is closed first by the owning manager).
    /// Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for BrokerWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

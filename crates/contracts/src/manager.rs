//! `DeviceManager` trait - per-device lifecycle contract.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::RecorderError;

/// Lifecycle phase flags, advanced monotonically by the owning
/// manager: none -> setup -> warmup -> running -> stopped.
///
/// Read lock-free by the orchestrator to confirm stage completion.
#[derive(Debug, Default)]
pub struct PhaseFlags {
    is_setup: AtomicBool,
    is_warmup: AtomicBool,
    is_running: AtomicBool,
}

impl PhaseFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_setup(&self) {
        self.is_setup.store(true, Ordering::Release);
    }

    pub fn mark_warmup(&self) {
        self.is_warmup.store(true, Ordering::Release);
    }

    pub fn mark_running(&self) {
        self.is_running.store(true, Ordering::Release);
    }

    pub fn mark_stopped(&self) {
        self.is_running.store(false, Ordering::Release);
    }

    pub fn is_setup(&self) -> bool {
        self.is_setup.load(Ordering::Acquire)
    }

    pub fn is_warmup(&self) -> bool {
        self.is_warmup.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }
}

/// A single device's owner: holds the capture pipeline and implements
/// the five lifecycle operations plus offline validation.
///
/// All methods take `&self`; managers guard their internals so the
/// orchestrator can fan stages out across threads. `stop` and
/// `cleanup` must be idempotent and tolerate partial prior state.
pub trait DeviceManager: Send + Sync {
    /// Stable device name (also the output subdirectory name).
    fn name(&self) -> &str;

    /// Instantiate sub-components, register the callback, configure
    /// streams, open output files.
    fn setup(&self) -> Result<(), RecorderError>;

    /// Begin streaming and block until the first frame arrives or the
    /// liveness window elapses.
    fn warmup(&self) -> Result<(), RecorderError>;

    /// Open the ring gate and start the consumer worker.
    fn start(&self) -> Result<(), RecorderError>;

    /// Tear down in reverse dependency order.
    fn stop(&self) -> Result<(), RecorderError>;

    /// Release handles, flush and close files.
    fn cleanup(&self) -> Result<(), RecorderError>;

    /// Single-recording sanity check (flat layout).
    fn check(&self) -> Result<bool, RecorderError>;

    /// Session-structured multi-video validation.
    fn verify(&self) -> Result<bool, RecorderError>;

    /// Phase flags, read by the orchestrator at stage barriers.
    fn phases(&self) -> &PhaseFlags;
}

//! Lifecycle orchestrator.
//!
//! Drives the registered device managers through setup / warmup /
//! start / stop / cleanup as stage barriers: each stage fans out one
//! blocking task per manager and waits for all of them under a single
//! wall-clock deadline measured from fan-out start. The first failing
//! or timed-out stage sets the abort flag; stop and cleanup always run
//! for every manager that reached setup.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{DeviceManager, RecorderError};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Forward lifecycle stages driven as barriers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Setup,
    Warmup,
    Start,
}

impl Stage {
    fn name(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Warmup => "warmup",
            Self::Start => "start",
        }
    }

    fn apply(self, manager: &dyn DeviceManager) -> Result<(), RecorderError> {
        match self {
            Self::Setup => manager.setup(),
            Self::Warmup => manager.warmup(),
            Self::Start => manager.start(),
        }
    }

    /// The phase flag that must be set once the stage completed.
    fn completed(self, manager: &dyn DeviceManager) -> bool {
        match self {
            Self::Setup => manager.phases().is_setup(),
            Self::Warmup => manager.phases().is_warmup(),
            Self::Start => manager.phases().is_running(),
        }
    }
}

/// Fan-out / barrier / timeout engine over the registered managers.
pub struct Orchestrator {
    managers: Vec<Arc<dyn DeviceManager>>,
    abort: AtomicBool,
    setup_started: AtomicBool,
    stage_timeout: Duration,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            managers: Vec::new(),
            abort: AtomicBool::new(false),
            setup_started: AtomicBool::new(false),
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
        }
    }

    /// Set the per-stage wall-clock budget.
    pub fn set_timeout(&mut self, timeout: Duration) {
        info!(timeout_ms = timeout.as_millis() as u64, "stage timeout set");
        self.stage_timeout = timeout;
    }

    /// Register a manager. Rejected once setup has begun.
    pub fn register(&mut self, manager: Arc<dyn DeviceManager>) -> Result<(), RecorderError> {
        if self.setup_started.load(Ordering::Acquire) {
            return Err(RecorderError::Other(
                "registration after setup has begun".into(),
            ));
        }
        info!(device = manager.name(), "manager registered");
        self.managers.push(manager);
        Ok(())
    }

    pub fn device_count(&self) -> usize {
        self.managers.len()
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    /// Set the abort flag and signal stop to every manager.
    /// Idempotent.
    pub async fn abort(&self) {
        if self.abort.swap(true, Ordering::AcqRel) {
            return;
        }
        warn!("abort requested");
        self.execute_stop().await;
    }

    pub async fn execute_setup(&self) -> bool {
        self.execute_stage(Stage::Setup).await
    }

    pub async fn execute_warmup(&self) -> bool {
        self.execute_stage(Stage::Warmup).await
    }

    pub async fn execute_start(&self) -> bool {
        self.execute_stage(Stage::Start).await
    }

    /// Fan stop out to every manager with the stage budget. Individual
    /// failures are logged but every manager gets the signal; always
    /// returns.
    pub async fn execute_stop(&self) {
        info!("coordinating stop phase");

        let mut tasks = JoinSet::new();
        for manager in &self.managers {
            let manager = Arc::clone(manager);
            tasks.spawn_blocking(move || {
                let name = manager.name().to_string();
                let result = manager.stop();
                (name, result)
            });
        }

        let barrier = async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((device, Ok(()))) => info!(device = %device, "manager stopped"),
                    Ok((device, Err(e))) => {
                        error!(device = %device, error = %e, "stop error")
                    }
                    Err(e) => error!(error = %e, "stop task panicked"),
                }
            }
        };

        if tokio::time::timeout(self.stage_timeout, barrier).await.is_err() {
            warn!("timeout waiting for stop phase");
        }

        info!("stop phase completed");
    }

    /// Clean up sequentially in registration order; one manager's
    /// failure never skips the rest.
    pub fn execute_cleanup(&self) {
        info!("coordinating cleanup phase");

        for manager in &self.managers {
            match manager.cleanup() {
                Ok(()) => info!(device = manager.name(), "manager cleaned up"),
                Err(e) => error!(device = manager.name(), error = %e, "cleanup error"),
            }
        }

        info!("cleanup phase completed");
    }

    /// Sequential offline validation; true iff every manager verifies.
    pub fn execute_verify(&self) -> bool {
        info!("coordinating verify phase");

        let mut all_valid = true;
        for manager in &self.managers {
            match manager.verify() {
                Ok(true) => info!(device = manager.name(), "verify passed"),
                Ok(false) => {
                    warn!(device = manager.name(), "verify failed");
                    all_valid = false;
                }
                Err(e) => {
                    error!(device = manager.name(), error = %e, "verify error");
                    all_valid = false;
                }
            }
        }

        info!(all_valid, "verify phase completed");
        all_valid
    }

    /// Sequential single-recording check; true iff every manager
    /// passes.
    pub fn execute_check(&self) -> bool {
        info!("coordinating check phase");

        let mut all_valid = true;
        for manager in &self.managers {
            match manager.check() {
                Ok(true) => info!(device = manager.name(), "check passed"),
                Ok(false) => {
                    warn!(device = manager.name(), "check failed");
                    all_valid = false;
                }
                Err(e) => {
                    error!(device = manager.name(), error = %e, "check error");
                    all_valid = false;
                }
            }
        }

        all_valid
    }

    async fn execute_stage(&self, stage: Stage) -> bool {
        let stage_name = stage.name();

        if self.abort.load(Ordering::Acquire) {
            warn!(stage = stage_name, "skipped, already aborted");
            return false;
        }
        if self.managers.is_empty() {
            warn!(stage = stage_name, "no managers registered");
            return false;
        }

        self.setup_started.store(true, Ordering::Release);
        info!(stage = stage_name, "coordinating stage");

        // One task per manager; the deadline covers the whole fan-out,
        // not each task.
        let mut tasks = JoinSet::new();
        for manager in &self.managers {
            let manager = Arc::clone(manager);
            tasks.spawn_blocking(move || {
                let name = manager.name().to_string();
                let result = stage.apply(manager.as_ref());
                (name, result)
            });
        }

        let barrier = async {
            let mut all_ok = true;
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((_, Ok(()))) => {}
                    Ok((device, Err(e))) => {
                        error!(device = %device, stage = stage_name, error = %e, "stage error");
                        all_ok = false;
                    }
                    Err(e) => {
                        error!(stage = stage_name, error = %e, "stage task panicked");
                        all_ok = false;
                    }
                }
            }
            all_ok
        };

        let mut success = match tokio::time::timeout(self.stage_timeout, barrier).await {
            Ok(all_ok) => all_ok,
            Err(_) => {
                // Outstanding tasks are orphaned; their results are
                // ignored and their side effects bounded by the
                // managers' own liveness timers.
                warn!(stage = stage_name, "timeout waiting for stage completion");
                false
            }
        };

        // The stage only counts once every manager's flag advanced.
        if success {
            success = self.managers.iter().all(|m| stage.completed(m.as_ref()));
        }

        if success {
            info!(stage = stage_name, "stage completed successfully");
        } else {
            error!(stage = stage_name, "stage failed, aborting");
            self.abort.store(true, Ordering::Release);
        }

        success
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

//! Per-device observability.
//!
//! Counters and latency tracking off the hot path: the capture
//! callback reports through lock-free atomics, a log sink receives
//! epoch-stamped events, and a recording analysis with percentiles and
//! a quality verdict is emitted when the session stops.

mod log_sink;
mod monitor;
mod process;
mod stats;

pub use log_sink::MonitorLog;
pub use monitor::{DeviceMonitor, FrameKind, MonitorSummary, QualityVerdict};
pub use process::{NullProcessMetrics, ProcessMetricsSource, ProcessSample, SystemMonitor};
pub use stats::RunningStats;

//! Error taxonomy, layered by origin: device / capture / writer /
//! calibration / verify.

use thiserror::Error;

/// Unified error type for the recording pipeline.
#[derive(Debug, Error)]
pub enum RecorderError {
    // ===== Device errors =====
    /// Device enumeration or stream configuration failed.
    #[error("device '{device}' setup error: {message}")]
    DeviceSetup { device: String, message: String },

    /// SDK subscription could not be established.
    #[error("device '{device}' subscription error: {message}")]
    Subscription { device: String, message: String },

    /// No frame arrived within the liveness window.
    #[error("device '{device}' warmup timeout after {waited_ms}ms")]
    WarmupTimeout { device: String, waited_ms: u64 },

    // ===== Capture errors =====
    /// Recording file (bag) error.
    #[error("device '{device}' recording error: {message}")]
    Recording { device: String, message: String },

    // ===== Writer errors =====
    /// Artifact writer error.
    #[error("writer '{writer}' error: {message}")]
    Writer { writer: String, message: String },

    // ===== Calibration errors =====
    /// Time-synchronization round trip failed.
    #[error("calibration error: {message}")]
    Calibration { message: String },

    // ===== Verify errors =====
    /// Offline validation error.
    #[error("verify error: {message}")]
    Verify { message: String },

    // ===== Generic =====
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl RecorderError {
    /// Create a device setup error.
    pub fn device_setup(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeviceSetup {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create a subscription error.
    pub fn subscription(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Subscription {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create a recording error.
    pub fn recording(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Recording {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create a writer error.
    pub fn writer(writer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Writer {
            writer: writer.into(),
            message: message.into(),
        }
    }

    /// Create a verify error.
    pub fn verify(message: impl Into<String>) -> Self {
        Self::Verify {
            message: message.into(),
        }
    }
}

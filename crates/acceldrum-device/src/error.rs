use std::time::Duration;

/// Errors that can occur while running a device or a host-side manager.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] acceldrum_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] acceldrum_frame::FrameError),

    /// A single task invocation overran the supervision timeout.
    #[error("task '{task}' overran supervision timeout ({elapsed:?})")]
    SupervisionTimeout { task: String, elapsed: Duration },

    /// A task requested a terminal halt.
    #[error("halted: {0}")]
    Halted(String),

    /// Sensor calibration failed.
    #[error("calibration failed: {0}")]
    Calibration(String),
}

pub type Result<T> = std::result::Result<T, DeviceError>;

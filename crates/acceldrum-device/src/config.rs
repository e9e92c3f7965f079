use std::time::Duration;

use acceldrum_frame::{FrameConfig, Settings};

/// Default supervision timeout for a single task invocation.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(4);

/// Default interval between motion samples (100 Hz).
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(10);

/// Default display refresh period.
pub const DEFAULT_DISPLAY_REFRESH: Duration = Duration::from_millis(100);

/// Calibration loops requested from the IMU per axis group.
pub const DEFAULT_CALIBRATION_LOOPS: u32 = 6;

/// Device run-loop configuration.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// A task invocation running longer than this stops the run loop.
    pub task_timeout: Duration,
    pub sample_interval: Duration,
    pub display_refresh: Duration,
    pub calibration_loops: u32,
    /// Stream samples from start-up instead of waiting for a poll-mode request.
    pub poll_mode: bool,
    /// Settings applied to the IMU at start-up and after a reset.
    pub settings: Settings,
    pub frame: FrameConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            task_timeout: DEFAULT_TASK_TIMEOUT,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            display_refresh: DEFAULT_DISPLAY_REFRESH,
            calibration_loops: DEFAULT_CALIBRATION_LOOPS,
            poll_mode: true,
            settings: Settings::default(),
            frame: FrameConfig::default(),
        }
    }
}

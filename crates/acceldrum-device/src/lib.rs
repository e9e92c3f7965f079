//! Device side of the acceldrum link.
//!
//! [`SerialManager`] owns one end of a byte link with its receiver, writer
//! and inbound queue; the host uses it too. [`Device`] wires it to the
//! motion sensor and display on a single-threaded [`Scheduler`], answering
//! `Configure` requests through the control table in [`control`].

pub mod config;
pub mod control;
pub mod device;
pub mod dispatch;
pub mod display;
pub mod error;
pub mod lock;
pub mod scheduler;
pub mod sensor;
pub mod serial;

pub use config::{
    DeviceConfig, DEFAULT_CALIBRATION_LOOPS, DEFAULT_DISPLAY_REFRESH, DEFAULT_SAMPLE_INTERVAL,
    DEFAULT_TASK_TIMEOUT,
};
pub use control::{lookup, respond, Action, Controls, Reply};
pub use device::{Device, DeviceState, DeviceStats, Peripherals};
pub use dispatch::{DispatchStats, Dispatcher};
pub use display::{Display, TextDisplay};
pub use error::{DeviceError, Result};
pub use lock::Shared;
pub use scheduler::{Schedule, Scheduler, Tick};
pub use sensor::{Calibration, Imu, ImuReading, SimulatedImu};
pub use serial::SerialManager;

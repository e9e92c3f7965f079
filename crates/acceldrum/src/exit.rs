use std::fmt;
use std::io;

use acceldrum_device::DeviceError;
use acceldrum_frame::FrameError;
use acceldrum_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

fn io_exit_code(kind: io::ErrorKind) -> i32 {
    match kind {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound => FAILURE,
        io::ErrorKind::InvalidInput => USAGE,
        _ => INTERNAL,
    }
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = match &err {
        TransportError::Open { source, .. } | TransportError::Io(source) => {
            io_exit_code(source.kind())
        }
        TransportError::Closed => FAILURE,
        TransportError::Stalled { .. } => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Transport(err) => transport_error(context, err),
        FrameError::InvalidType(_) | FrameError::PayloadSizeMismatch { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn device_error(context: &str, err: DeviceError) -> CliError {
    match err {
        DeviceError::Transport(err) => transport_error(context, err),
        DeviceError::Frame(err) => frame_error(context, err),
        DeviceError::SupervisionTimeout { .. } => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        DeviceError::Halted(_) | DeviceError::Calibration(_) => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_link_is_plain_failure() {
        let err = device_error("send failed", DeviceError::Transport(TransportError::Closed));
        assert_eq!(err.code, FAILURE);
        assert_eq!(err.message, "send failed: link closed");
    }

    #[test]
    fn invalid_type_is_data_invalid() {
        let err = device_error("send failed", DeviceError::Frame(FrameError::InvalidType(4)));
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn permission_denied_on_open() {
        let err = transport_error(
            "open failed",
            TransportError::Open {
                path: "/dev/ttyACM0".into(),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            },
        );
        assert_eq!(err.code, PERMISSION_DENIED);
    }

    #[test]
    fn open_error_keeps_device_path() {
        let err = transport_error(
            "serial port",
            TransportError::Open {
                path: "/dev/ttyACM7".into(),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
        );
        assert_eq!(err.code, FAILURE);
        assert!(err.message.starts_with("serial port: failed to open /dev/ttyACM7"));
    }

    #[test]
    fn rejected_line_settings_are_usage_errors() {
        let err = transport_error(
            "serial port",
            TransportError::Open {
                path: "/dev/ttyACM0".into(),
                source: io::Error::from(io::ErrorKind::InvalidInput),
            },
        );
        assert_eq!(err.code, USAGE);
    }
}

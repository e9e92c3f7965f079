use std::path::Path;
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::info;

use crate::error::{Result, TransportError};
use crate::stream::StreamLink;

/// Line rate the device firmware runs at.
pub const DEFAULT_BAUD: u32 = 1_152_000;

/// Line settings for a serial device.
///
/// The baud rate is a deployment setting agreed out of band; nothing on the
/// wire negotiates it. Framing is always 8N1 with no flow control.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Line rate in bits per second.
    pub baud: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self { baud: DEFAULT_BAUD }
    }
}

/// A serial device opened for non-blocking I/O.
pub type SerialLink = StreamLink<Box<dyn SerialPort>>;

/// Open a serial device in raw 8N1 mode at `config.baud`.
///
/// Reads use a zero timeout, so an idle line reads as "nothing available"
/// instead of blocking the caller.
pub fn open_serial(path: impl AsRef<Path>, config: &SerialConfig) -> Result<SerialLink> {
    let path = path.as_ref();
    let port = serialport::new(path.to_string_lossy(), config.baud)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(Duration::ZERO)
        .open()
        .map_err(|err| TransportError::Open {
            path: path.to_path_buf(),
            source: err.into(),
        })?;

    info!(?path, baud = config.baud, "opened serial device");
    Ok(StreamLink::new(port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_baud_matches_firmware() {
        assert_eq!(SerialConfig::default().baud, 1_152_000);
    }

    #[test]
    fn missing_device_reports_open_error_with_path() {
        let err = open_serial("/definitely/not/here", &SerialConfig::default())
            .expect_err("missing device should not open");
        assert!(matches!(err, TransportError::Open { .. }));
        assert!(err.to_string().contains("/definitely/not/here"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn pty_opens_at_firmware_baud_and_carries_bytes() {
        use std::io::Read;

        use serialport::TTYPort;

        use crate::traits::ByteLink;

        let (mut master, mut slave) = TTYPort::pair().expect("pty pair should open");
        slave
            .set_exclusive(false)
            .expect("slave should allow a second open");
        let path = slave.name().expect("slave should have a path");

        let mut link = open_serial(&path, &SerialConfig::default())
            .expect("pty slave should open at the firmware baud");
        let mut buf = [0u8; 8];
        assert_eq!(
            link.read_available(&mut buf).expect("idle read should succeed"),
            0
        );

        link.write_all(b"frame").expect("write should succeed");
        let mut out = [0u8; 5];
        master
            .read_exact(&mut out)
            .expect("master should see the bytes");
        assert_eq!(&out, b"frame");
    }
}

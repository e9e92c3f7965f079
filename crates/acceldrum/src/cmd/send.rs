use std::time::{Duration, Instant};

use acceldrum_device::{lookup, SerialManager};
use acceldrum_frame::{
    ConfigureKind, ConfigurePacket, ConfigureValue, InnerPayload, Packet, PacketType, Settings,
};
use acceldrum_transport::ByteLink;

use crate::cmd::{open_port, parse_duration, ConfigureArgs, SendArgs, SendMessage};
use crate::exit::{device_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_packet, OutputFormat};

const WAIT_SLEEP: Duration = Duration::from_millis(1);

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let request = match &args.message {
        SendMessage::Configure(configure) => Some(build_request(configure)?),
        SendMessage::Text(_) => None,
    };
    if args.wait && request.is_none() {
        return Err(CliError::new(USAGE, "--wait only applies to configure requests"));
    }

    let mut serial = SerialManager::new(open_port(&args.port)?);

    let sent = match (&request, &args.message) {
        (Some(request), _) => serial.send_typed(request),
        (None, SendMessage::Text(text)) if text.line => serial.send_line(&text.message),
        (None, SendMessage::Text(text)) => serial.send_text(&text.message),
        (None, SendMessage::Configure(_)) => Ok(()),
    };
    sent.map_err(|err| device_error("send failed", err))?;

    if let Some(kind) = request.and_then(|r| r.kind()).filter(|_| args.wait) {
        let reply = wait_for_reply(&mut serial, kind, wait_timeout)?;
        print_packet(&reply, format);
    }

    Ok(SUCCESS)
}

/// Turn command-line arguments into a request the device will answer.
fn build_request(args: &ConfigureArgs) -> CliResult<ConfigurePacket> {
    let kind = ConfigureKind::from(args.kind);
    let value = ConfigureValue::from(args.value);
    if lookup(kind, value).is_none() {
        return Err(CliError::new(
            USAGE,
            format!("'{} {}' is not a supported request", kind.name(), value.name()),
        ));
    }

    let wants_settings = args.accel_range.is_some() || args.gyro_range.is_some() || args.raw;
    let is_settings_set = kind == ConfigureKind::Settings && value == ConfigureValue::Set;
    if wants_settings && !is_settings_set {
        return Err(CliError::new(
            USAGE,
            "--accel-range, --gyro-range and --raw need --kind settings --value set",
        ));
    }

    let request = ConfigurePacket::new(kind, value);
    if !is_settings_set {
        return Ok(request);
    }
    let defaults = Settings::default();
    Ok(request.with_settings(&Settings {
        accel_range: args.accel_range.unwrap_or(defaults.accel_range),
        gyro_range: args.gyro_range.unwrap_or(defaults.gyro_range),
        raw_samples: args.raw,
        ..defaults
    }))
}

/// Poll until a `Configure` packet of `kind` arrives, skipping other traffic.
fn wait_for_reply<L: ByteLink>(
    serial: &mut SerialManager<L>,
    kind: ConfigureKind,
    timeout: Duration,
) -> CliResult<Packet> {
    let deadline = Instant::now() + timeout;
    loop {
        let summary = serial
            .poll()
            .map_err(|err| device_error("receive failed", err))?;
        while let Some(packet) = serial.try_dequeue() {
            if packet.packet_type() != Some(PacketType::Configure) {
                tracing::trace!(raw_type = packet.raw_type, "skipping while waiting for reply");
                continue;
            }
            let reply = ConfigurePacket::decode_inner(&packet.inner);
            if reply.kind() == Some(kind) {
                return Ok(packet);
            }
        }
        if Instant::now() >= deadline {
            return Err(CliError::new(
                TIMEOUT,
                format!("no {} reply within {timeout:?}", kind.name()),
            ));
        }
        if summary.bytes == 0 {
            std::thread::sleep(WAIT_SLEEP);
        }
    }
}

#[cfg(test)]
mod tests {
    use acceldrum_frame::{AccelPacket, AccelRange};
    use acceldrum_transport::MemoryLink;

    use super::*;
    use crate::cmd::{KindArg, ValueArg};

    fn configure(kind: KindArg, value: ValueArg) -> ConfigureArgs {
        ConfigureArgs {
            kind,
            value,
            accel_range: None,
            gyro_range: None,
            raw: false,
        }
    }

    #[test]
    fn unsupported_pairs_are_usage_errors() {
        let err = build_request(&configure(KindArg::Reset, ValueArg::Get))
            .expect_err("reset get should be rejected");
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn settings_flags_fill_the_data_region() {
        let mut args = configure(KindArg::Settings, ValueArg::Set);
        args.accel_range = Some(AccelRange::G16);
        args.raw = true;
        let request = build_request(&args).expect("settings set should build");
        let settings = request.settings().expect("settings should decode");
        assert_eq!(settings.accel_range, AccelRange::G16);
        assert!(settings.raw_samples);
    }

    #[test]
    fn settings_flags_need_settings_set() {
        let mut args = configure(KindArg::Backlight, ValueArg::On);
        args.raw = true;
        assert_eq!(build_request(&args).expect_err("should fail").code, USAGE);
    }

    #[test]
    fn wait_skips_unrelated_traffic() {
        let (host, device) = MemoryLink::pair();
        let mut device = SerialManager::new(device);
        device
            .send_typed(&AccelPacket::default())
            .expect("device send should succeed");
        device
            .send_typed(&ConfigurePacket::ack(ConfigureKind::PollMode))
            .expect("device send should succeed");
        device
            .send_typed(&ConfigurePacket::new(ConfigureKind::Backlight, ConfigureValue::On))
            .expect("device send should succeed");

        let mut host = SerialManager::new(host);
        let reply = wait_for_reply(&mut host, ConfigureKind::Backlight, Duration::from_secs(1))
            .expect("reply should arrive");
        assert_eq!(
            ConfigurePacket::decode_inner(&reply.inner).value(),
            Some(ConfigureValue::On)
        );
    }

    #[test]
    fn wait_times_out_without_reply() {
        let (host, _device) = MemoryLink::pair();
        let mut host = SerialManager::new(host);
        let err = wait_for_reply(&mut host, ConfigureKind::Reset, Duration::from_millis(20))
            .expect_err("nothing was sent");
        assert_eq!(err.code, TIMEOUT);
    }
}

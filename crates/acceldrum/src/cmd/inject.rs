use acceldrum_device::SerialManager;
use acceldrum_frame::{Packet, PacketType, INNER_SIZE};
use acceldrum_transport::ByteLink;

use crate::cmd::{open_port, InjectArgs};
use crate::exit::{device_error, CliResult, SUCCESS};
use crate::output::{print_stats, OutputFormat};

pub fn run(args: InjectArgs, format: OutputFormat) -> CliResult<i32> {
    let mut serial = SerialManager::new(open_port(&args.port)?);
    let sent = inject(&mut serial, args.count, args.crc)?;
    print_stats(&[("injected", sent)], format);
    Ok(SUCCESS)
}

/// A well-formed frame whose checksum is `crc` instead of the real one.
///
/// The receiver frames it on the magic trailer and counts it as corrupted.
pub fn corrupt_frame(crc: u32) -> Packet {
    let mut inner = [0u8; INNER_SIZE];
    inner[..4].copy_from_slice(&crc.to_le_bytes());
    let mut packet = Packet::new(PacketType::Text, inner);
    packet.crc32 = crc;
    packet
}

fn inject<L: ByteLink>(serial: &mut SerialManager<L>, count: usize, crc: u32) -> CliResult<u64> {
    let packet = corrupt_frame(crc);
    for _ in 0..count {
        serial
            .send_raw(&packet)
            .map_err(|err| device_error("inject failed", err))?;
    }
    tracing::info!(count, crc = %format!("{crc:#x}"), "corrupt frames sent");
    Ok(count as u64)
}

use std::fmt::Write as _;

use bytes::{Buf, BufMut, BytesMut};

use crate::checksum::Crc32;
use crate::queue::OverflowPolicy;
use crate::writer::SendPolicy;

/// Total wire size of every frame. Both ends must agree.
pub const FRAME_SIZE: usize = 64;

/// Size of the `type` field.
pub const TYPE_SIZE: usize = 4;

/// Size of the `crc32` field.
pub const CRC_SIZE: usize = 4;

/// Size of the trailing `magic` field.
pub const MAGIC_SIZE: usize = 8;

/// Size of the opaque payload region.
pub const INNER_SIZE: usize = FRAME_SIZE - TYPE_SIZE - CRC_SIZE - MAGIC_SIZE;

/// Byte offset of `inner` within a frame.
pub const INNER_OFFSET: usize = TYPE_SIZE;

/// Byte offset of `crc32` within a frame.
pub const CRC_OFFSET: usize = INNER_OFFSET + INNER_SIZE;

/// Byte offset of `magic` within a frame.
pub const MAGIC_OFFSET: usize = CRC_OFFSET + CRC_SIZE;

/// Number of leading bytes covered by the checksum (`type ‖ inner`).
pub const CHECKED_LEN: usize = TYPE_SIZE + INNER_SIZE;

/// Trailer present at the end of every frame.
pub const MAGIC: u64 = 0xDEAD_BEEF_8008_5069;

/// `MAGIC` as seen by a left-shifting accumulator fed the little-endian
/// trailer one byte at a time.
pub const MAGIC_REVERSED: u64 = MAGIC.swap_bytes();

const _: () = assert!(FRAME_SIZE == 64, "frame size is a wire contract");
const _: () = assert!(INNER_SIZE == 48);
const _: () = assert!(MAGIC_OFFSET + MAGIC_SIZE == FRAME_SIZE);

/// Packet type tag, the first field of every frame.
///
/// `None` and `Count` are sentinels and never valid on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum PacketType {
    None = 0,
    Accel = 1,
    RawAccel = 2,
    Text = 3,
    Configure = 4,
    Count = 5,
}

impl PacketType {
    /// Every sendable type, in tag order.
    pub const ALL: [PacketType; 4] = [
        PacketType::Accel,
        PacketType::RawAccel,
        PacketType::Text,
        PacketType::Configure,
    ];

    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::None),
            1 => Some(Self::Accel),
            2 => Some(Self::RawAccel),
            3 => Some(Self::Text),
            4 => Some(Self::Configure),
            5 => Some(Self::Count),
            _ => None,
        }
    }

    pub fn as_raw(self) -> u32 {
        self as u32
    }

    /// True for tags strictly between the `None` and `Count` sentinels.
    pub fn is_sendable(self) -> bool {
        is_valid_type(self.as_raw())
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Accel => "ACCEL",
            Self::RawAccel => "RAW_ACCEL",
            Self::Text => "TEXT",
            Self::Configure => "CONFIGURE",
            Self::Count => "COUNT",
        }
    }

    /// Parse a case-insensitive name as printed by [`PacketType::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

/// True for raw tags strictly between `None` and `Count`.
pub fn is_valid_type(raw: u32) -> bool {
    raw > PacketType::None as u32 && raw < PacketType::Count as u32
}

/// One wire frame.
///
/// Wire format (little-endian, no padding):
/// ```text
/// ┌───────────┬──────────────────┬───────────┬──────────────────────┐
/// │ type (4B) │ inner (48B)      │ crc32 (4B)│ magic (8B)           │
/// │ u32 LE    │ opaque payload   │ u32 LE    │ 0xDEADBEEF80085069 LE│
/// └───────────┴──────────────────┴───────────┴──────────────────────┘
/// ```
/// `crc32` covers `type ‖ inner` only.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    /// Raw type tag. Kept raw so frames with unknown tags survive decoding.
    pub raw_type: u32,
    pub inner: [u8; INNER_SIZE],
    pub crc32: u32,
    pub magic: u64,
}

impl Default for Packet {
    fn default() -> Self {
        Self {
            raw_type: PacketType::None.as_raw(),
            inner: [0; INNER_SIZE],
            crc32: 0,
            magic: 0,
        }
    }
}

impl Packet {
    /// Build an unsealed frame: magic set, checksum zero.
    pub fn new(packet_type: PacketType, inner: [u8; INNER_SIZE]) -> Self {
        Self {
            raw_type: packet_type.as_raw(),
            inner,
            crc32: 0,
            magic: MAGIC,
        }
    }

    /// Known type tag, if any.
    pub fn packet_type(&self) -> Option<PacketType> {
        PacketType::from_raw(self.raw_type)
    }

    /// Checksum of `type ‖ inner` computed with a fresh pass over `crc`.
    pub fn compute_crc(&self, crc: &mut Crc32) -> u32 {
        crc.restart();
        crc.add(&self.raw_type.to_le_bytes());
        crc.add(&self.inner);
        crc.calc()
    }

    /// Fill in `crc32` from the current `type` and `inner`.
    pub fn seal(&mut self, crc: &mut Crc32) {
        self.crc32 = self.compute_crc(crc);
    }

    /// True when the stored checksum matches the content.
    pub fn verify(&self, crc: &mut Crc32) -> bool {
        self.compute_crc(crc) == self.crc32
    }

    pub fn has_magic(&self) -> bool {
        self.magic == MAGIC
    }

    /// Append the wire encoding to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(FRAME_SIZE);
        dst.put_u32_le(self.raw_type);
        dst.put_slice(&self.inner);
        dst.put_u32_le(self.crc32);
        dst.put_u64_le(self.magic);
    }

    pub fn to_bytes(&self) -> [u8; FRAME_SIZE] {
        let mut out = [0u8; FRAME_SIZE];
        let mut dst = &mut out[..];
        dst.put_u32_le(self.raw_type);
        dst.put_slice(&self.inner);
        dst.put_u32_le(self.crc32);
        dst.put_u64_le(self.magic);
        out
    }

    /// Decode a frame from exactly [`FRAME_SIZE`] bytes. Never fails; use
    /// [`Packet::verify`] and [`Packet::has_magic`] to judge it.
    pub fn from_bytes(bytes: &[u8; FRAME_SIZE]) -> Self {
        let mut src = &bytes[..];
        let raw_type = src.get_u32_le();
        let mut inner = [0u8; INNER_SIZE];
        src.copy_to_slice(&mut inner);
        let crc32 = src.get_u32_le();
        let magic = src.get_u64_le();
        Self {
            raw_type,
            inner,
            crc32,
            magic,
        }
    }

    /// Uppercase hex of the whole frame, `group` bytes per word and
    /// `per_line` words per line.
    pub fn hex_dump(&self, group: usize, per_line: usize) -> String {
        let group = group.max(1);
        let line = group * per_line.max(1);
        let bytes = self.to_bytes();
        let mut out = String::with_capacity(FRAME_SIZE * 3);
        for (i, byte) in bytes.iter().enumerate() {
            let _ = write!(out, "{byte:02X}");
            let n = i + 1;
            if n % line == 0 {
                if n < FRAME_SIZE {
                    out.push('\n');
                }
            } else if n % group == 0 {
                out.push(' ');
            }
        }
        out
    }
}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let type_name = self.packet_type().map_or("UNKNOWN", PacketType::name);
        f.debug_struct("Packet")
            .field("type", &format_args!("{type_name}({})", self.raw_type))
            .field("crc32", &format_args!("{:#010X}", self.crc32))
            .field("magic", &format_args!("{:#018X}", self.magic))
            .finish_non_exhaustive()
    }
}

/// Configuration for the receive and send paths.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum bytes consumed by one receiver invocation. Default: 2 frames.
    pub bytes_per_poll: usize,
    /// What to do when a validated frame meets a full inbound queue.
    pub overflow: OverflowPolicy,
    /// Whether invalid send requests are dropped silently or reported.
    pub send_policy: SendPolicy,
}

/// Default per-invocation byte budget for the receiver.
pub const DEFAULT_BYTES_PER_POLL: usize = 2 * FRAME_SIZE;

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            bytes_per_poll: DEFAULT_BYTES_PER_POLL,
            overflow: OverflowPolicy::default(),
            send_policy: SendPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_packet() -> Packet {
        let mut inner = [0u8; INNER_SIZE];
        for (i, b) in inner.iter_mut().enumerate() {
            *b = i as u8;
        }
        let mut packet = Packet::new(PacketType::Text, inner);
        packet.seal(&mut Crc32::new());
        packet
    }

    #[test]
    fn layout_offsets() {
        assert_eq!(INNER_OFFSET, 4);
        assert_eq!(CRC_OFFSET, 52);
        assert_eq!(MAGIC_OFFSET, 56);
        assert_eq!(CHECKED_LEN, 52);
    }

    #[test]
    fn wire_layout_is_little_endian() {
        let packet = sample_packet();
        let bytes = packet.to_bytes();

        assert_eq!(&bytes[..4], &3u32.to_le_bytes());
        assert_eq!(&bytes[INNER_OFFSET..CRC_OFFSET], &packet.inner);
        assert_eq!(&bytes[CRC_OFFSET..MAGIC_OFFSET], &packet.crc32.to_le_bytes());
        assert_eq!(
            &bytes[MAGIC_OFFSET..],
            &[0x69, 0x50, 0x08, 0x80, 0xEF, 0xBE, 0xAD, 0xDE]
        );
    }

    #[test]
    fn encode_matches_to_bytes() {
        let packet = sample_packet();
        let mut buf = BytesMut::new();
        packet.encode(&mut buf);
        assert_eq!(buf.len(), FRAME_SIZE);
        assert_eq!(buf.as_ref(), &packet.to_bytes()[..]);
    }

    #[test]
    fn from_bytes_restores_every_field() {
        let packet = sample_packet();
        let decoded = Packet::from_bytes(&packet.to_bytes());
        assert_eq!(decoded, packet);
        assert!(decoded.has_magic());
        assert!(decoded.verify(&mut Crc32::new()));
    }

    #[test]
    fn checksum_covers_type_and_inner_only() {
        let packet = sample_packet();
        let bytes = packet.to_bytes();
        assert_eq!(packet.crc32, crate::checksum::checksum(&bytes[..CHECKED_LEN]));

        let mut other_magic = packet;
        other_magic.magic = 0;
        assert!(other_magic.verify(&mut Crc32::new()));
    }

    #[test]
    fn magic_reversed_is_bytewise_reversal() {
        assert_eq!(MAGIC_REVERSED, 0x6950_0880_EFBE_ADDE);
    }

    #[test]
    fn sentinel_types_are_not_sendable() {
        assert!(!PacketType::None.is_sendable());
        assert!(!PacketType::Count.is_sendable());
        assert!(PacketType::ALL.iter().all(|t| t.is_sendable()));
        assert!(!is_valid_type(99));
    }

    #[test]
    fn type_names_round_trip() {
        assert_eq!(PacketType::from_name("raw-accel"), Some(PacketType::RawAccel));
        assert_eq!(PacketType::from_name("configure"), Some(PacketType::Configure));
        assert_eq!(PacketType::from_name("none"), None);
    }

    #[test]
    fn hex_dump_groups_and_lines() {
        let packet = Packet::default();
        let dump = packet.hex_dump(4, 4);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), FRAME_SIZE / 16);
        assert_eq!(lines[0], "00000000 00000000 00000000 00000000");
    }

    #[test]
    fn debug_shows_type_name() {
        let text = format!("{:?}", sample_packet());
        assert!(text.contains("TEXT(3)"));
    }
}

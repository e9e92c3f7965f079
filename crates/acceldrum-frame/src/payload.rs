//! Typed views of the `inner` region.
//!
//! Every layout is encoded and decoded field by field in little-endian order;
//! unused tail bytes are zero padding.

use bytes::{Buf, BufMut};

use crate::codec::{Packet, PacketType, INNER_SIZE};
use crate::control::ConfigurePacket;
use crate::error::{FrameError, Result};

/// A record that lives in the `inner` region of a frame.
pub trait InnerPayload: Sized {
    /// Tag the record is sent under.
    const PACKET_TYPE: PacketType;
    /// Encoded size before padding. Never exceeds [`INNER_SIZE`].
    const WIRE_SIZE: usize;

    fn put<B: BufMut>(&self, dst: &mut B);

    fn get<B: Buf>(src: &mut B) -> Self;

    /// Encode into a zero-padded inner region.
    fn encode_inner(&self) -> [u8; INNER_SIZE] {
        let mut out = [0u8; INNER_SIZE];
        let mut dst = &mut out[..];
        self.put(&mut dst);
        out
    }

    fn decode_inner(inner: &[u8; INNER_SIZE]) -> Self {
        let mut src = &inner[..];
        Self::get(&mut src)
    }
}

/// Fused motion sample: world-frame acceleration, orientation quaternion
/// and Euler angles.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AccelPacket {
    /// Microseconds since the previous sample was sent.
    pub delta_micros: u64,
    pub ax: f32,
    pub ay: f32,
    pub az: f32,
    pub gx: f32,
    pub gy: f32,
    pub gz: f32,
    pub gw: f32,
    pub ex: f32,
    pub ey: f32,
    pub ez: f32,
}

impl InnerPayload for AccelPacket {
    const PACKET_TYPE: PacketType = PacketType::Accel;
    const WIRE_SIZE: usize = 8 + 10 * 4;

    fn put<B: BufMut>(&self, dst: &mut B) {
        dst.put_u64_le(self.delta_micros);
        for v in [
            self.ax, self.ay, self.az, self.gx, self.gy, self.gz, self.gw, self.ex, self.ey,
            self.ez,
        ] {
            dst.put_f32_le(v);
        }
    }

    fn get<B: Buf>(src: &mut B) -> Self {
        Self {
            delta_micros: src.get_u64_le(),
            ax: src.get_f32_le(),
            ay: src.get_f32_le(),
            az: src.get_f32_le(),
            gx: src.get_f32_le(),
            gy: src.get_f32_le(),
            gz: src.get_f32_le(),
            gw: src.get_f32_le(),
            ex: src.get_f32_le(),
            ey: src.get_f32_le(),
            ez: src.get_f32_le(),
        }
    }
}

/// One raw accelerometer/gyro reading inside a [`RawAccelPacket`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawSample {
    pub delta_micros: u32,
    pub ax: f32,
    pub ay: f32,
    pub az: f32,
    pub gx: f32,
    pub gy: f32,
    pub gz: f32,
}

/// Encoded size of one [`RawSample`].
pub const RAW_SAMPLE_SIZE: usize = 4 + 6 * 4;

/// How many raw samples fit in one frame.
pub const RAW_SAMPLES_PER_PACKET: usize = INNER_SIZE / RAW_SAMPLE_SIZE;

const _: () = assert!(RAW_SAMPLES_PER_PACKET >= 1);

impl RawSample {
    fn put<B: BufMut>(&self, dst: &mut B) {
        dst.put_u32_le(self.delta_micros);
        for v in [self.ax, self.ay, self.az, self.gx, self.gy, self.gz] {
            dst.put_f32_le(v);
        }
    }

    fn get<B: Buf>(src: &mut B) -> Self {
        Self {
            delta_micros: src.get_u32_le(),
            ax: src.get_f32_le(),
            ay: src.get_f32_le(),
            az: src.get_f32_le(),
            gx: src.get_f32_le(),
            gy: src.get_f32_le(),
            gz: src.get_f32_le(),
        }
    }
}

/// A batch of raw readings, amortising frame overhead over several samples.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawAccelPacket {
    pub samples: [RawSample; RAW_SAMPLES_PER_PACKET],
}

impl InnerPayload for RawAccelPacket {
    const PACKET_TYPE: PacketType = PacketType::RawAccel;
    const WIRE_SIZE: usize = RAW_SAMPLES_PER_PACKET * RAW_SAMPLE_SIZE;

    fn put<B: BufMut>(&self, dst: &mut B) {
        for sample in &self.samples {
            sample.put(dst);
        }
    }

    fn get<B: Buf>(src: &mut B) -> Self {
        let mut samples = [RawSample::default(); RAW_SAMPLES_PER_PACKET];
        for sample in &mut samples {
            *sample = RawSample::get(src);
        }
        Self { samples }
    }
}

/// Bytes of text carried by one [`TextPacket`].
pub const TEXT_CAPACITY: usize = INNER_SIZE - 4 - 1;

/// One chunk of a text stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPacket {
    /// Number of meaningful bytes in `chars`.
    pub length: u32,
    /// Another chunk of the same text follows.
    pub has_next: bool,
    pub chars: [u8; TEXT_CAPACITY],
}

impl Default for TextPacket {
    fn default() -> Self {
        Self {
            length: 0,
            has_next: false,
            chars: [0; TEXT_CAPACITY],
        }
    }
}

impl TextPacket {
    /// Build a chunk from up to [`TEXT_CAPACITY`] bytes; longer input is cut.
    pub fn new(text: &[u8], has_next: bool) -> Self {
        let len = text.len().min(TEXT_CAPACITY);
        let mut chars = [0u8; TEXT_CAPACITY];
        chars[..len].copy_from_slice(&text[..len]);
        Self {
            length: len as u32,
            has_next,
            chars,
        }
    }

    /// Meaningful bytes, with a corrupt `length` clamped to the capacity.
    pub fn text(&self) -> &[u8] {
        let len = (self.length as usize).min(TEXT_CAPACITY);
        &self.chars[..len]
    }
}

impl InnerPayload for TextPacket {
    const PACKET_TYPE: PacketType = PacketType::Text;
    const WIRE_SIZE: usize = 4 + 1 + TEXT_CAPACITY;

    fn put<B: BufMut>(&self, dst: &mut B) {
        dst.put_u32_le(self.length);
        dst.put_u8(u8::from(self.has_next));
        dst.put_slice(&self.chars);
    }

    fn get<B: Buf>(src: &mut B) -> Self {
        let length = src.get_u32_le();
        let has_next = src.get_u8() != 0;
        let mut chars = [0u8; TEXT_CAPACITY];
        src.copy_to_slice(&mut chars);
        Self {
            length,
            has_next,
            chars,
        }
    }
}

const _: () = assert!(AccelPacket::WIRE_SIZE <= INNER_SIZE);
const _: () = assert!(RawAccelPacket::WIRE_SIZE <= INNER_SIZE);
const _: () = assert!(TextPacket::WIRE_SIZE == INNER_SIZE);

/// Decoded `inner`, keyed by packet type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload {
    Accel(AccelPacket),
    RawAccel(RawAccelPacket),
    Text(TextPacket),
    Configure(ConfigurePacket),
}

impl Payload {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Self::Accel(_) => PacketType::Accel,
            Self::RawAccel(_) => PacketType::RawAccel,
            Self::Text(_) => PacketType::Text,
            Self::Configure(_) => PacketType::Configure,
        }
    }

    pub fn encode(&self) -> [u8; INNER_SIZE] {
        match self {
            Self::Accel(p) => p.encode_inner(),
            Self::RawAccel(p) => p.encode_inner(),
            Self::Text(p) => p.encode_inner(),
            Self::Configure(p) => p.encode_inner(),
        }
    }

    /// Interpret `inner` according to `packet_type`.
    pub fn decode(packet_type: PacketType, inner: &[u8; INNER_SIZE]) -> Result<Self> {
        match packet_type {
            PacketType::Accel => Ok(Self::Accel(AccelPacket::decode_inner(inner))),
            PacketType::RawAccel => Ok(Self::RawAccel(RawAccelPacket::decode_inner(inner))),
            PacketType::Text => Ok(Self::Text(TextPacket::decode_inner(inner))),
            PacketType::Configure => Ok(Self::Configure(ConfigurePacket::decode_inner(inner))),
            PacketType::None | PacketType::Count => {
                Err(FrameError::UnsupportedPayload(packet_type.as_raw()))
            }
        }
    }

    pub fn from_packet(packet: &Packet) -> Result<Self> {
        let packet_type = packet
            .packet_type()
            .ok_or(FrameError::UnsupportedPayload(packet.raw_type))?;
        Self::decode(packet_type, &packet.inner)
    }
}

impl From<AccelPacket> for Payload {
    fn from(p: AccelPacket) -> Self {
        Self::Accel(p)
    }
}

impl From<RawAccelPacket> for Payload {
    fn from(p: RawAccelPacket) -> Self {
        Self::RawAccel(p)
    }
}

impl From<TextPacket> for Payload {
    fn from(p: TextPacket) -> Self {
        Self::Text(p)
    }
}

impl From<ConfigurePacket> for Payload {
    fn from(p: ConfigurePacket) -> Self {
        Self::Configure(p)
    }
}

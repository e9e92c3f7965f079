//! Control sub-protocol carried in `Configure` packets.
//!
//! The numeric values below are a deployment contract shared bit-for-bit
//! with the firmware.

use bytes::{Buf, BufMut};

use crate::codec::PacketType;
use crate::payload::InnerPayload;

/// Size of [`ConfigurePacket::data`].
pub const CONFIGURE_DATA_SIZE: usize = crate::codec::INNER_SIZE - 8;

/// What a `Configure` packet is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ConfigureKind {
    None = 0,
    Backlight = 1,
    PollMode = 2,
    Settings = 3,
    Calibrate = 4,
    Reset = 5,
}

impl ConfigureKind {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::None),
            1 => Some(Self::Backlight),
            2 => Some(Self::PollMode),
            3 => Some(Self::Settings),
            4 => Some(Self::Calibrate),
            5 => Some(Self::Reset),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Backlight => "backlight",
            Self::PollMode => "poll-mode",
            Self::Settings => "settings",
            Self::Calibrate => "calibrate",
            Self::Reset => "reset",
        }
    }
}

/// Request or response value of a `Configure` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ConfigureValue {
    None = 0,
    Ack = 1,
    Nack = 2,
    Get = 3,
    On = 4,
    Off = 5,
    Toggle = 6,
    Set = 7,
}

impl ConfigureValue {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::None),
            1 => Some(Self::Ack),
            2 => Some(Self::Nack),
            3 => Some(Self::Get),
            4 => Some(Self::On),
            5 => Some(Self::Off),
            6 => Some(Self::Toggle),
            7 => Some(Self::Set),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Ack => "ack",
            Self::Nack => "nack",
            Self::Get => "get",
            Self::On => "on",
            Self::Off => "off",
            Self::Toggle => "toggle",
            Self::Set => "set",
        }
    }

    /// `On`/`Off` for a boolean state.
    pub fn from_state(on: bool) -> Self {
        if on {
            Self::On
        } else {
            Self::Off
        }
    }
}

/// Generic control-channel payload.
///
/// `kind` and `value` are kept raw so unknown combinations can be carried
/// and ignored rather than rejected at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigurePacket {
    pub kind: u32,
    pub value: i32,
    pub data: [u8; CONFIGURE_DATA_SIZE],
}

impl ConfigurePacket {
    pub fn new(kind: ConfigureKind, value: ConfigureValue) -> Self {
        Self {
            kind: kind as u32,
            value: value as i32,
            data: [0; CONFIGURE_DATA_SIZE],
        }
    }

    /// Acknowledge a request of `kind`.
    pub fn ack(kind: ConfigureKind) -> Self {
        Self::new(kind, ConfigureValue::Ack)
    }

    /// Attach settings to the data region.
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.data = settings.encode();
        self
    }

    pub fn kind(&self) -> Option<ConfigureKind> {
        ConfigureKind::from_raw(self.kind)
    }

    pub fn value(&self) -> Option<ConfigureValue> {
        ConfigureValue::from_raw(self.value)
    }

    /// Interpret the data region as [`Settings`].
    pub fn settings(&self) -> Option<Settings> {
        Settings::decode(&self.data)
    }
}

impl InnerPayload for ConfigurePacket {
    const PACKET_TYPE: PacketType = PacketType::Configure;
    const WIRE_SIZE: usize = 8 + CONFIGURE_DATA_SIZE;

    fn put<B: BufMut>(&self, dst: &mut B) {
        dst.put_u32_le(self.kind);
        dst.put_i32_le(self.value);
        dst.put_slice(&self.data);
    }

    fn get<B: Buf>(src: &mut B) -> Self {
        let kind = src.get_u32_le();
        let value = src.get_i32_le();
        let mut data = [0u8; CONFIGURE_DATA_SIZE];
        src.copy_to_slice(&mut data);
        Self { kind, value, data }
    }
}

/// Accelerometer full-scale range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum AccelRange {
    G2 = 0,
    G4 = 1,
    #[default]
    G8 = 2,
    G16 = 3,
}

impl AccelRange {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::G2),
            1 => Some(Self::G4),
            2 => Some(Self::G8),
            3 => Some(Self::G16),
            _ => None,
        }
    }

    /// Full-scale value in g.
    pub fn full_scale_g(self) -> f32 {
        match self {
            Self::G2 => 2.0,
            Self::G4 => 4.0,
            Self::G8 => 8.0,
            Self::G16 => 16.0,
        }
    }
}

/// Gyroscope full-scale range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum GyroRange {
    Dps250 = 0,
    Dps500 = 1,
    #[default]
    Dps1000 = 2,
    Dps2000 = 3,
}

impl GyroRange {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Dps250),
            1 => Some(Self::Dps500),
            2 => Some(Self::Dps1000),
            3 => Some(Self::Dps2000),
            _ => None,
        }
    }

    /// Full-scale value in degrees per second.
    pub fn full_scale_dps(self) -> f32 {
        match self {
            Self::Dps250 => 250.0,
            Self::Dps500 => 500.0,
            Self::Dps1000 => 1000.0,
            Self::Dps2000 => 2000.0,
        }
    }
}

/// Sensor settings exchanged through `Configure`/`Settings` packets.
///
/// Data layout: accel range (u8), gyro range (u8), raw streaming flag (u8),
/// reserved (u8), accel offsets (3 × i16 LE), gyro offsets (3 × i16 LE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Settings {
    pub accel_range: AccelRange,
    pub gyro_range: GyroRange,
    /// Stream `RawAccel` batches instead of fused `Accel` samples.
    pub raw_samples: bool,
    pub accel_offset: [i16; 3],
    pub gyro_offset: [i16; 3],
}

const SETTINGS_SIZE: usize = 4 + 6 + 6;
const _: () = assert!(SETTINGS_SIZE <= CONFIGURE_DATA_SIZE);

impl Settings {
    pub fn encode(&self) -> [u8; CONFIGURE_DATA_SIZE] {
        let mut out = [0u8; CONFIGURE_DATA_SIZE];
        let mut dst = &mut out[..];
        dst.put_u8(self.accel_range as u8);
        dst.put_u8(self.gyro_range as u8);
        dst.put_u8(u8::from(self.raw_samples));
        dst.put_u8(0);
        for v in self.accel_offset.iter().chain(&self.gyro_offset) {
            dst.put_i16_le(*v);
        }
        out
    }

    /// Decode settings; `None` when a range byte is out of the table.
    pub fn decode(data: &[u8; CONFIGURE_DATA_SIZE]) -> Option<Self> {
        let mut src = &data[..];
        let accel_range = AccelRange::from_raw(src.get_u8())?;
        let gyro_range = GyroRange::from_raw(src.get_u8())?;
        let raw_samples = src.get_u8() != 0;
        src.advance(1);
        let mut accel_offset = [0i16; 3];
        for v in &mut accel_offset {
            *v = src.get_i16_le();
        }
        let mut gyro_offset = [0i16; 3];
        for v in &mut gyro_offset {
            *v = src.get_i16_le();
        }
        Some(Self {
            accel_range,
            gyro_range,
            raw_samples,
            accel_offset,
            gyro_offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configure_packet_fills_inner_exactly() {
        assert_eq!(ConfigurePacket::WIRE_SIZE, crate::codec::INNER_SIZE);
    }

    #[test]
    fn unknown_kind_and_value_survive_decode() {
        let packet = ConfigurePacket {
            kind: 77,
            value: -3,
            data: [0; CONFIGURE_DATA_SIZE],
        };
        let decoded = ConfigurePacket::decode_inner(&packet.encode_inner());
        assert_eq!(decoded, packet);
        assert_eq!(decoded.kind(), None);
        assert_eq!(decoded.value(), None);
    }

    #[test]
    fn settings_travel_in_data_region() {
        let settings = Settings {
            accel_range: AccelRange::G16,
            gyro_range: GyroRange::Dps250,
            raw_samples: true,
            accel_offset: [-1, 2, 1788],
            gyro_offset: [220, 76, -85],
        };
        let packet = ConfigurePacket::new(ConfigureKind::Settings, ConfigureValue::Set)
            .with_settings(&settings);
        let decoded = ConfigurePacket::decode_inner(&packet.encode_inner());
        assert_eq!(decoded.settings(), Some(settings));
    }

    #[test]
    fn out_of_range_settings_are_rejected() {
        let mut data = Settings::default().encode();
        data[0] = 9;
        assert_eq!(Settings::decode(&data), None);
    }

    #[test]
    fn state_maps_to_on_off() {
        assert_eq!(ConfigureValue::from_state(true), ConfigureValue::On);
        assert_eq!(ConfigureValue::from_state(false), ConfigureValue::Off);
    }
}

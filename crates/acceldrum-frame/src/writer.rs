use acceldrum_transport::ByteLink;
use bytes::BytesMut;

use crate::checksum::Crc32;
use crate::codec::{is_valid_type, FrameConfig, Packet, PacketType, FRAME_SIZE, INNER_SIZE};
use crate::error::{FrameError, Result};
use crate::payload::{InnerPayload, Payload};

/// How [`FrameWriter`] treats a send it cannot frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendPolicy {
    /// Drop the request without writing anything and report success.
    #[default]
    Lenient,
    /// Drop the request and return the reason.
    Strict,
}

/// Serialises payloads into frames and writes each frame in one shot.
///
/// Fire-and-forget: nothing is awaited after the write.
pub struct FrameWriter {
    crc: Crc32,
    buf: BytesMut,
    policy: SendPolicy,
}

impl FrameWriter {
    pub fn new() -> Self {
        Self::with_policy(SendPolicy::default())
    }

    pub fn with_config(config: &FrameConfig) -> Self {
        Self::with_policy(config.send_policy)
    }

    pub fn with_policy(policy: SendPolicy) -> Self {
        Self {
            crc: Crc32::new(),
            buf: BytesMut::with_capacity(FRAME_SIZE),
            policy,
        }
    }

    pub fn policy(&self) -> SendPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: SendPolicy) {
        self.policy = policy;
    }

    /// Frame `payload` under `packet_type` and write it.
    ///
    /// `payload` must fill the inner region exactly and the type must not be
    /// a sentinel. Otherwise nothing is written; the policy decides whether
    /// the caller hears about it.
    pub fn send<L>(&mut self, link: &mut L, packet_type: PacketType, payload: &[u8]) -> Result<()>
    where
        L: ByteLink + ?Sized,
    {
        self.send_tagged(link, packet_type.as_raw(), payload)
    }

    /// As [`FrameWriter::send`] with a raw type tag.
    pub fn send_tagged<L>(&mut self, link: &mut L, raw_type: u32, payload: &[u8]) -> Result<()>
    where
        L: ByteLink + ?Sized,
    {
        if !is_valid_type(raw_type) {
            return self.reject(FrameError::InvalidType(raw_type));
        }
        let Ok(inner) = <[u8; INNER_SIZE]>::try_from(payload) else {
            return self.reject(FrameError::PayloadSizeMismatch {
                size: payload.len(),
                expected: INNER_SIZE,
            });
        };

        let mut packet = Packet {
            raw_type,
            ..Packet::new(PacketType::None, inner)
        };
        packet.seal(&mut self.crc);
        self.write_packet(link, &packet)
    }

    pub fn send_payload<L>(&mut self, link: &mut L, payload: &Payload) -> Result<()>
    where
        L: ByteLink + ?Sized,
    {
        self.send(link, payload.packet_type(), &payload.encode())
    }

    pub fn send_typed<L, P>(&mut self, link: &mut L, payload: &P) -> Result<()>
    where
        L: ByteLink + ?Sized,
        P: InnerPayload,
    {
        self.send(link, P::PACKET_TYPE, &payload.encode_inner())
    }

    /// Write `packet` verbatim, whatever its type, checksum or trailer.
    ///
    /// Diagnostic hook for exercising the receiver's resynchronisation.
    pub fn send_raw<L>(&mut self, link: &mut L, packet: &Packet) -> Result<()>
    where
        L: ByteLink + ?Sized,
    {
        tracing::debug!(
            raw_type = packet.raw_type,
            crc32 = packet.crc32,
            "writing raw frame"
        );
        self.write_packet(link, packet)
    }

    fn write_packet<L>(&mut self, link: &mut L, packet: &Packet) -> Result<()>
    where
        L: ByteLink + ?Sized,
    {
        self.buf.clear();
        packet.encode(&mut self.buf);
        link.write_all(&self.buf)?;
        link.flush()?;
        tracing::trace!(raw_type = packet.raw_type, "frame sent");
        Ok(())
    }

    fn reject(&self, err: FrameError) -> Result<()> {
        match self.policy {
            SendPolicy::Lenient => {
                tracing::debug!(error = %err, "send dropped");
                Ok(())
            }
            SendPolicy::Strict => Err(err),
        }
    }
}

impl Default for FrameWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameWriter")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

use acceldrum_frame::{
    text_line_packets, text_packets, FrameConfig, FrameReceiver, FrameWriter, InboundQueue,
    InnerPayload, LinkStats, Packet, PacketType, Payload, PollSummary,
};
use acceldrum_transport::ByteLink;

use crate::error::Result;

/// Owns one end of a link together with its receive and send state.
///
/// Used on both sides: the device polls it from its scheduler, the host
/// polls it from its listen loop.
pub struct SerialManager<L> {
    link: L,
    receiver: FrameReceiver,
    writer: FrameWriter,
    inbound: InboundQueue,
}

impl<L: ByteLink> SerialManager<L> {
    pub fn new(link: L) -> Self {
        Self::with_config(link, &FrameConfig::default())
    }

    pub fn with_config(link: L, config: &FrameConfig) -> Self {
        Self {
            link,
            receiver: FrameReceiver::with_config(config),
            writer: FrameWriter::with_config(config),
            inbound: InboundQueue::new(config.overflow),
        }
    }

    /// Discard whatever is pending on the link and forget partial frames.
    ///
    /// Call before normal operation so boot-time noise is never framed.
    /// Returns the number of bytes discarded.
    pub fn init(&mut self) -> Result<usize> {
        let discarded = self.link.discard_input()?;
        self.receiver.clear();
        tracing::debug!(discarded, "serial input flushed");
        Ok(discarded)
    }

    /// One receiver invocation, bounded by the configured byte cap.
    pub fn poll(&mut self) -> Result<PollSummary> {
        Ok(self.receiver.poll(&mut self.link, &mut self.inbound)?)
    }

    pub fn send(&mut self, packet_type: PacketType, payload: &[u8]) -> Result<()> {
        Ok(self.writer.send(&mut self.link, packet_type, payload)?)
    }

    pub fn send_payload(&mut self, payload: &Payload) -> Result<()> {
        Ok(self.writer.send_payload(&mut self.link, payload)?)
    }

    pub fn send_typed<P: InnerPayload>(&mut self, payload: &P) -> Result<()> {
        Ok(self.writer.send_typed(&mut self.link, payload)?)
    }

    /// Write `packet` verbatim; see [`FrameWriter::send_raw`].
    pub fn send_raw(&mut self, packet: &Packet) -> Result<()> {
        Ok(self.writer.send_raw(&mut self.link, packet)?)
    }

    /// Send `text` as a run of `Text` chunks.
    pub fn send_text(&mut self, text: &str) -> Result<()> {
        for chunk in text_packets(text.as_bytes()) {
            self.send_typed(&chunk)?;
        }
        Ok(())
    }

    /// Send `text` followed by a newline chunk.
    pub fn send_line(&mut self, text: &str) -> Result<()> {
        for chunk in text_line_packets(text.as_bytes()) {
            self.send_typed(&chunk)?;
        }
        Ok(())
    }

    pub fn try_dequeue(&mut self) -> Option<Packet> {
        self.inbound.try_dequeue()
    }

    /// Head-of-line filtered dequeue; see [`InboundQueue::try_dequeue_type`].
    pub fn try_dequeue_type(&mut self, packet_type: PacketType) -> Option<Packet> {
        self.inbound.try_dequeue_type(packet_type)
    }

    pub fn peek(&self) -> Option<&Packet> {
        self.inbound.peek()
    }

    /// Packets waiting in the inbound queue.
    pub fn pending(&self) -> usize {
        self.inbound.len()
    }

    pub fn stats(&self) -> LinkStats {
        self.receiver.stats()
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }
}

impl<L> std::fmt::Debug for SerialManager<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialManager")
            .field("receiver", &self.receiver)
            .field("writer", &self.writer)
            .field("inbound", &self.inbound)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use acceldrum_frame::{ConfigureKind, ConfigurePacket, ConfigureValue, TextAssembler};
    use acceldrum_transport::MemoryLink;

    use super::*;

    fn pair() -> (SerialManager<MemoryLink>, SerialManager<MemoryLink>) {
        let (a, b) = MemoryLink::pair();
        (SerialManager::new(a), SerialManager::new(b))
    }

    fn poll_all(manager: &mut SerialManager<MemoryLink>) {
        while manager.poll().expect("poll should succeed").bytes > 0 {}
    }

    #[test]
    fn init_discards_boot_noise() {
        let (mut host, mut device) = pair();
        device.link().feed(&[0x69, 0x50, 0x08, 0x80, 1, 2, 3]);
        assert_eq!(device.init().expect("init should succeed"), 7);

        let request = ConfigurePacket::new(ConfigureKind::Backlight, ConfigureValue::Get);
        host.send_typed(&request).expect("send should succeed");
        poll_all(&mut device);

        let packet = device
            .try_dequeue_type(PacketType::Configure)
            .expect("request should arrive");
        assert_eq!(ConfigurePacket::decode_inner(&packet.inner), request);
        assert_eq!(device.stats().corrupted, 0);
    }

    #[test]
    fn text_lines_reassemble_on_the_other_end() {
        let (mut host, mut device) = pair();
        let message = "calibration finished, offsets stored in settings";
        device.send_line(message).expect("send should succeed");
        poll_all(&mut host);

        let mut assembler = TextAssembler::new();
        let mut lines = Vec::new();
        while let Some(packet) = host.try_dequeue() {
            if let Ok(Payload::Text(chunk)) = Payload::from_packet(&packet) {
                lines.extend(assembler.push(&chunk));
            }
        }
        assert_eq!(lines, vec![format!("{message}\n")]);
    }

    #[test]
    fn stats_track_received_frames() {
        let (mut host, mut device) = pair();
        for _ in 0..3 {
            device.send_text("x").expect("send should succeed");
        }
        poll_all(&mut host);
        assert_eq!(host.stats().received, 3);
        assert_eq!(host.pending(), 3);
        assert_eq!(host.peek().and_then(Packet::packet_type), Some(PacketType::Text));
    }
}

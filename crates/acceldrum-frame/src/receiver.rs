use acceldrum_transport::ByteLink;

use crate::checksum::Crc32;
use crate::codec::{FrameConfig, Packet, DEFAULT_BYTES_PER_POLL, FRAME_SIZE, MAGIC_REVERSED};
use crate::error::Result;
use crate::queue::{Enqueued, InboundQueue};
use crate::ring::Ring;

const READ_CHUNK_SIZE: usize = FRAME_SIZE;

/// Link-quality counters, monotonically increasing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Frames that passed validation and were offered to the queue.
    pub received: u64,
    /// Magic-terminated candidates whose checksum did not match.
    pub corrupted: u64,
    /// Validated frames lost to queue overflow.
    pub dropped: u64,
    /// Bytes consumed from the link.
    pub bytes_read: u64,
}

/// What one [`FrameReceiver::poll`] invocation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub bytes: usize,
    pub frames: usize,
    pub corrupted: usize,
}

/// Self-synchronising frame scanner.
///
/// Every byte is treated as the possible last byte of a frame. A 64-bit
/// shift register holds the last eight bytes; when it equals the magic
/// trailer and the window holds a full frame, the window is drained into a
/// candidate and checksum-validated. Garbage and lost bytes heal on their
/// own as soon as a genuine trailer reappears.
pub struct FrameReceiver {
    window: Ring<u8, FRAME_SIZE>,
    last_word: u64,
    crc: Crc32,
    stats: LinkStats,
    bytes_per_poll: usize,
}

impl FrameReceiver {
    pub fn new() -> Self {
        Self::with_bytes_per_poll(DEFAULT_BYTES_PER_POLL)
    }

    pub fn with_config(config: &FrameConfig) -> Self {
        Self::with_bytes_per_poll(config.bytes_per_poll)
    }

    /// A cap of zero is raised to one byte so polling always makes progress.
    pub fn with_bytes_per_poll(bytes_per_poll: usize) -> Self {
        Self {
            window: Ring::new(),
            last_word: 0,
            crc: Crc32::new(),
            stats: LinkStats::default(),
            bytes_per_poll: bytes_per_poll.max(1),
        }
    }

    pub fn bytes_per_poll(&self) -> usize {
        self.bytes_per_poll
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Bytes currently held in the parsing window.
    pub fn buffered(&self) -> usize {
        self.window.len()
    }

    /// Forget partial input. Counters are kept.
    pub fn clear(&mut self) {
        self.window.clear();
        self.last_word = 0;
    }

    /// Advance the scanner by one byte.
    ///
    /// Returns a validated packet when `byte` completes one. Corrupt
    /// candidates are counted and discarded.
    pub fn push_byte(&mut self, byte: u8) -> Option<Packet> {
        self.stats.bytes_read += 1;
        self.window.push_back(byte);
        self.last_word = (self.last_word << 8) | u64::from(byte);

        if !self.window.is_full() || self.last_word != MAGIC_REVERSED {
            return None;
        }

        let mut candidate = [0u8; FRAME_SIZE];
        self.window.drain_into(&mut candidate);
        let packet = Packet::from_bytes(&candidate);

        if !packet.verify(&mut self.crc) {
            self.stats.corrupted += 1;
            tracing::warn!(
                raw_type = packet.raw_type,
                crc32 = packet.crc32,
                corrupted = self.stats.corrupted,
                "checksum mismatch, frame dropped"
            );
            return None;
        }

        tracing::trace!(raw_type = packet.raw_type, "frame validated");
        Some(packet)
    }

    /// Scan a byte slice, queueing validated packets. No byte cap applies.
    pub fn feed<const N: usize>(
        &mut self,
        bytes: &[u8],
        queue: &mut InboundQueue<N>,
    ) -> PollSummary {
        let mut summary = PollSummary::default();
        for &byte in bytes {
            self.scan(byte, queue, &mut summary);
        }
        summary
    }

    /// One cooperative invocation: read what the link has, up to the
    /// configured byte cap, and queue every validated packet.
    ///
    /// A link error clears the window before it is returned.
    pub fn poll<L, const N: usize>(
        &mut self,
        link: &mut L,
        queue: &mut InboundQueue<N>,
    ) -> Result<PollSummary>
    where
        L: ByteLink + ?Sized,
    {
        let mut summary = PollSummary::default();
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        while summary.bytes < self.bytes_per_poll {
            let want = (self.bytes_per_poll - summary.bytes).min(READ_CHUNK_SIZE);
            let read = match link.read_available(&mut chunk[..want]) {
                Ok(n) => n.min(want),
                Err(err) => {
                    self.clear();
                    return Err(err.into());
                }
            };
            if read == 0 {
                break;
            }
            for &byte in &chunk[..read] {
                self.scan(byte, queue, &mut summary);
            }
        }

        Ok(summary)
    }

    fn scan<const N: usize>(
        &mut self,
        byte: u8,
        queue: &mut InboundQueue<N>,
        summary: &mut PollSummary,
    ) {
        summary.bytes += 1;
        let corrupted_before = self.stats.corrupted;
        let Some(packet) = self.push_byte(byte) else {
            if self.stats.corrupted != corrupted_before {
                summary.corrupted += 1;
            }
            return;
        };

        match queue.push(packet) {
            Enqueued::Stored => {
                self.stats.received += 1;
                summary.frames += 1;
            }
            Enqueued::Evicted(evicted) => {
                self.stats.received += 1;
                self.stats.dropped += 1;
                summary.frames += 1;
                tracing::debug!(
                    raw_type = evicted.raw_type,
                    "inbound queue full, evicted oldest"
                );
            }
            Enqueued::Rejected(rejected) => {
                self.stats.dropped += 1;
                tracing::debug!(
                    raw_type = rejected.raw_type,
                    "inbound queue full, rejected new"
                );
            }
        }
    }
}

impl Default for FrameReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameReceiver")
            .field("buffered", &self.window.len())
            .field("last_word", &format_args!("{:#018X}", self.last_word))
            .field("bytes_per_poll", &self.bytes_per_poll)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use acceldrum_transport::{MemoryLink, TransportError};

    use super::*;
    use crate::codec::{PacketType, CHECKED_LEN, INNER_SIZE, MAGIC};
    use crate::queue::OverflowPolicy;

    fn sealed(packet_type: PacketType, tag: u8) -> Packet {
        let mut inner = [0u8; INNER_SIZE];
        for (i, b) in inner.iter_mut().enumerate() {
            *b = tag.wrapping_add(i as u8);
        }
        let mut packet = Packet::new(packet_type, inner);
        packet.seal(&mut Crc32::new());
        packet
    }

    /// Deterministic noise that never contains the trailer bytes in order.
    fn garbage(len: usize) -> Vec<u8> {
        let mut state: u32 = 0x1234_5678;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 24) as u8
            })
            .collect()
    }

    fn contains_magic(bytes: &[u8]) -> bool {
        bytes.windows(8).any(|w| w == MAGIC.to_le_bytes())
    }

    /// Unlimited input that records how much was asked of it.
    struct Endless {
        served: usize,
    }

    impl ByteLink for Endless {
        fn read_available(&mut self, buf: &mut [u8]) -> acceldrum_transport::Result<usize> {
            buf.fill(0xA5);
            self.served += buf.len();
            Ok(buf.len())
        }

        fn write_all(&mut self, _bytes: &[u8]) -> acceldrum_transport::Result<()> {
            Ok(())
        }
    }

    /// Serves its bytes, then fails.
    struct Failing {
        bytes: Vec<u8>,
    }

    impl ByteLink for Failing {
        fn read_available(&mut self, buf: &mut [u8]) -> acceldrum_transport::Result<usize> {
            if self.bytes.is_empty() {
                return Err(TransportError::Closed);
            }
            let n = buf.len().min(self.bytes.len());
            buf[..n].copy_from_slice(&self.bytes[..n]);
            self.bytes.drain(..n);
            Ok(n)
        }

        fn write_all(&mut self, _bytes: &[u8]) -> acceldrum_transport::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn trailer_is_detected_on_the_last_byte_only() {
        let bytes = sealed(PacketType::Accel, 1).to_bytes();
        let mut receiver = FrameReceiver::new();
        for &b in &bytes[..FRAME_SIZE - 1] {
            assert!(receiver.push_byte(b).is_none());
        }
        let packet = receiver.push_byte(bytes[FRAME_SIZE - 1]).unwrap();
        assert_eq!(packet.to_bytes(), bytes);
        assert_eq!(receiver.buffered(), 0);
    }

    #[test]
    fn single_frame_is_queued() {
        let packet = sealed(PacketType::Text, 7);
        let mut receiver = FrameReceiver::new();
        let mut queue: InboundQueue = InboundQueue::default();

        let summary = receiver.feed(&packet.to_bytes(), &mut queue);
        assert_eq!(summary.frames, 1);
        assert_eq!(queue.try_dequeue(), Some(packet));
        assert_eq!(receiver.stats().received, 1);
        assert_eq!(receiver.stats().bytes_read, FRAME_SIZE as u64);
    }

    #[test]
    fn any_bit_flip_in_checked_region_is_corruption() {
        let bytes = sealed(PacketType::Configure, 3).to_bytes();
        for bit in 0..CHECKED_LEN * 8 {
            let mut flipped = bytes;
            flipped[bit / 8] ^= 1 << (bit % 8);

            let mut receiver = FrameReceiver::new();
            let mut queue: InboundQueue = InboundQueue::default();
            let summary = receiver.feed(&flipped, &mut queue);

            assert_eq!(summary.corrupted, 1, "bit {bit}");
            assert!(queue.is_empty(), "bit {bit}");
            assert_eq!(receiver.stats().received, 0);
            assert_eq!(receiver.stats().corrupted, 1);
        }
    }

    #[test]
    fn resyncs_after_garbage() {
        let packet = sealed(PacketType::Accel, 42);
        for k in 0..200 {
            let mut stream = garbage(k);
            assert!(!contains_magic(&stream));
            stream.extend_from_slice(&packet.to_bytes());

            let mut receiver = FrameReceiver::new();
            let mut queue: InboundQueue = InboundQueue::default();
            receiver.feed(&stream, &mut queue);

            assert_eq!(queue.len(), 1, "k = {k}");
            assert_eq!(queue.try_dequeue(), Some(packet));
            assert_eq!(receiver.stats().corrupted, 0);
        }
    }

    #[test]
    fn truncated_frame_is_skipped_and_next_frame_recovered() {
        let first = sealed(PacketType::Text, 1).to_bytes();
        let second = sealed(PacketType::Text, 2);
        let mut stream = first[..40].to_vec();
        stream.extend_from_slice(&second.to_bytes());

        let mut receiver = FrameReceiver::new();
        let mut queue: InboundQueue = InboundQueue::default();
        receiver.feed(&stream, &mut queue);

        assert_eq!(queue.try_dequeue(), Some(second));
        assert!(queue.is_empty());
    }

    #[test]
    fn corrupt_frame_does_not_hide_the_next_one() {
        let mut corrupt = sealed(PacketType::Text, 1);
        corrupt.crc32 = 0x6969;
        let good = sealed(PacketType::Text, 2);
        let mut stream = corrupt.to_bytes().to_vec();
        stream.extend_from_slice(&good.to_bytes());

        let mut receiver = FrameReceiver::new();
        let mut queue: InboundQueue = InboundQueue::default();
        receiver.feed(&stream, &mut queue);

        assert_eq!(receiver.stats().corrupted, 1);
        assert_eq!(receiver.stats().received, 1);
        assert_eq!(queue.try_dequeue(), Some(good));
    }

    #[test]
    fn chunked_polls_match_single_poll() {
        let packet = sealed(PacketType::RawAccel, 9);
        for cap in 1..FRAME_SIZE {
            let (mut host, _device) = MemoryLink::pair();
            host.feed(&packet.to_bytes());

            let mut receiver = FrameReceiver::with_bytes_per_poll(cap);
            let mut queue: InboundQueue = InboundQueue::default();
            let mut polls = 0;
            loop {
                let summary = receiver.poll(&mut host, &mut queue).unwrap();
                if summary.bytes == 0 {
                    break;
                }
                assert!(summary.bytes <= cap);
                polls += 1;
            }

            assert_eq!(polls, FRAME_SIZE.div_ceil(cap), "cap = {cap}");
            assert_eq!(queue.try_dequeue(), Some(packet), "cap = {cap}");
            assert!(queue.is_empty());
        }
    }

    #[test]
    fn poll_never_exceeds_byte_cap() {
        for cap in [1, 7, 64, 128, 1000] {
            let mut link = Endless { served: 0 };
            let mut receiver = FrameReceiver::with_bytes_per_poll(cap);
            let mut queue: InboundQueue = InboundQueue::default();

            let summary = receiver.poll(&mut link, &mut queue).unwrap();
            assert_eq!(summary.bytes, cap);
            assert_eq!(link.served, cap);
        }
    }

    #[test]
    fn zero_cap_still_progresses() {
        let receiver = FrameReceiver::with_bytes_per_poll(0);
        assert_eq!(receiver.bytes_per_poll(), 1);
    }

    #[test]
    fn overflow_evict_oldest_counts_received_and_dropped() {
        let mut receiver = FrameReceiver::new();
        let mut queue: InboundQueue<4> = InboundQueue::new(OverflowPolicy::EvictOldest);
        for tag in 0..6u8 {
            receiver.feed(&sealed(PacketType::Text, tag).to_bytes(), &mut queue);
        }

        let stats = receiver.stats();
        assert_eq!(stats.received, 6);
        assert_eq!(stats.dropped, 2);
        let tags: Vec<u8> = queue.iter().map(|p| p.inner[0]).collect();
        assert_eq!(tags, vec![2, 3, 4, 5]);
    }

    #[test]
    fn overflow_reject_new_counts_only_dropped() {
        let mut receiver = FrameReceiver::new();
        let mut queue: InboundQueue<4> = InboundQueue::new(OverflowPolicy::RejectNew);
        for tag in 0..6u8 {
            receiver.feed(&sealed(PacketType::Text, tag).to_bytes(), &mut queue);
        }

        let stats = receiver.stats();
        assert_eq!(stats.received, 4);
        assert_eq!(stats.dropped, 2);
        let tags: Vec<u8> = queue.iter().map(|p| p.inner[0]).collect();
        assert_eq!(tags, vec![0, 1, 2, 3]);
    }

    #[test]
    fn link_error_clears_partial_frame() {
        let bytes = sealed(PacketType::Text, 5).to_bytes();
        let mut link = Failing {
            bytes: bytes[..30].to_vec(),
        };
        let mut receiver = FrameReceiver::with_bytes_per_poll(1024);
        let mut queue: InboundQueue = InboundQueue::default();

        let err = receiver.poll(&mut link, &mut queue).unwrap_err();
        assert!(matches!(
            err,
            crate::error::FrameError::Transport(TransportError::Closed)
        ));
        assert_eq!(receiver.buffered(), 0);

        receiver.feed(&bytes[30..], &mut queue);
        assert!(queue.is_empty());
    }

    #[test]
    fn clear_keeps_counters() {
        let mut receiver = FrameReceiver::new();
        let mut queue: InboundQueue = InboundQueue::default();
        receiver.feed(&sealed(PacketType::Text, 1).to_bytes(), &mut queue);
        receiver.feed(&[1, 2, 3], &mut queue);
        receiver.clear();
        assert_eq!(receiver.buffered(), 0);
        assert_eq!(receiver.stats().received, 1);
    }
}

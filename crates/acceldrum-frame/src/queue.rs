use crate::codec::{Packet, PacketType};
use crate::ring::Ring;

/// Default inbound queue capacity, in packets.
pub const INBOUND_CAPACITY: usize = 16;

/// What happens when a validated packet arrives at a full queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Drop the oldest queued packet and keep the new one.
    #[default]
    EvictOldest,
    /// Keep the queue as is and drop the new packet.
    RejectNew,
}

impl OverflowPolicy {
    pub fn name(self) -> &'static str {
        match self {
            Self::EvictOldest => "evict-oldest",
            Self::RejectNew => "reject-new",
        }
    }
}

/// Outcome of [`InboundQueue::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Stored,
    /// Stored after evicting the packet carried here.
    Evicted(Packet),
    /// Not stored; the packet is handed back.
    Rejected(Packet),
}

impl Enqueued {
    /// True when the pushed packet is now in the queue.
    pub fn is_stored(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }

    /// True when some packet was lost.
    pub fn dropped(&self) -> bool {
        !matches!(self, Self::Stored)
    }
}

/// Bounded FIFO of validated packets.
///
/// Single writer (the receiver), single reader (the dispatcher).
pub struct InboundQueue<const N: usize = INBOUND_CAPACITY> {
    packets: Ring<Packet, N>,
    policy: OverflowPolicy,
}

impl<const N: usize> InboundQueue<N> {
    pub fn new(policy: OverflowPolicy) -> Self {
        Self {
            packets: Ring::new(),
            policy,
        }
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn push(&mut self, packet: Packet) -> Enqueued {
        match self.policy {
            OverflowPolicy::EvictOldest => match self.packets.push_back(packet) {
                Some(evicted) => Enqueued::Evicted(evicted),
                None => Enqueued::Stored,
            },
            OverflowPolicy::RejectNew => match self.packets.try_push_back(packet) {
                Ok(()) => Enqueued::Stored,
                Err(packet) => Enqueued::Rejected(packet),
            },
        }
    }

    /// Oldest packet, removed.
    pub fn try_dequeue(&mut self) -> Option<Packet> {
        self.packets.pop_front()
    }

    /// Oldest packet, removed only if it has the requested type.
    ///
    /// A head packet of another type blocks this call until it is consumed
    /// through [`InboundQueue::try_dequeue`]; later packets are never skipped
    /// to. Sentinel types never match.
    pub fn try_dequeue_type(&mut self, packet_type: PacketType) -> Option<Packet> {
        if !packet_type.is_sendable() {
            return None;
        }
        match self.packets.front() {
            Some(head) if head.raw_type == packet_type.as_raw() => self.packets.pop_front(),
            _ => None,
        }
    }

    pub fn peek(&self) -> Option<&Packet> {
        self.packets.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Packet> + '_ {
        self.packets.iter()
    }

    pub fn clear(&mut self) {
        self.packets.clear();
    }
}

impl<const N: usize> Default for InboundQueue<N> {
    fn default() -> Self {
        Self::new(OverflowPolicy::default())
    }
}

impl<const N: usize> std::fmt::Debug for InboundQueue<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundQueue")
            .field("len", &self.len())
            .field("capacity", &N)
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::INNER_SIZE;

    fn packet(packet_type: PacketType, tag: u8) -> Packet {
        Packet::new(packet_type, [tag; INNER_SIZE])
    }

    fn tags<const N: usize>(queue: &InboundQueue<N>) -> Vec<u8> {
        queue.iter().map(|p| p.inner[0]).collect()
    }

    #[test]
    fn default_capacity_and_policy() {
        let queue: InboundQueue = InboundQueue::default();
        assert_eq!(queue.capacity(), 16);
        assert_eq!(queue.policy(), OverflowPolicy::EvictOldest);
        assert!(queue.is_empty());
    }

    #[test]
    fn evict_oldest_keeps_newest_n() {
        let mut queue: InboundQueue<4> = InboundQueue::new(OverflowPolicy::EvictOldest);
        for tag in 0..6 {
            let outcome = queue.push(packet(PacketType::Text, tag));
            assert!(outcome.is_stored());
        }
        assert_eq!(tags(&queue), vec![2, 3, 4, 5]);
        assert_eq!(
            queue.push(packet(PacketType::Text, 6)),
            Enqueued::Evicted(packet(PacketType::Text, 2))
        );
    }

    #[test]
    fn reject_new_keeps_oldest_n() {
        let mut queue: InboundQueue<4> = InboundQueue::new(OverflowPolicy::RejectNew);
        for tag in 0..4 {
            assert_eq!(queue.push(packet(PacketType::Text, tag)), Enqueued::Stored);
        }
        let outcome = queue.push(packet(PacketType::Text, 9));
        assert!(!outcome.is_stored());
        assert!(outcome.dropped());
        assert_eq!(tags(&queue), vec![0, 1, 2, 3]);
    }

    #[test]
    fn filtered_dequeue_blocks_on_head() {
        let mut queue: InboundQueue<4> = InboundQueue::default();
        queue.push(packet(PacketType::Text, 1));
        queue.push(packet(PacketType::Configure, 2));

        assert_eq!(queue.try_dequeue_type(PacketType::Configure), None);
        assert_eq!(queue.len(), 2);

        let head = queue.try_dequeue_type(PacketType::Text).unwrap();
        assert_eq!(head.inner[0], 1);
        let next = queue.try_dequeue_type(PacketType::Configure).unwrap();
        assert_eq!(next.inner[0], 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn sentinel_filter_never_matches() {
        let mut queue: InboundQueue<2> = InboundQueue::default();
        queue.push(Packet::default());
        assert_eq!(queue.try_dequeue_type(PacketType::None), None);
        assert!(queue.try_dequeue().is_some());
    }

    #[test]
    fn peek_does_not_remove() {
        let mut queue: InboundQueue<2> = InboundQueue::default();
        queue.push(packet(PacketType::Accel, 5));
        assert_eq!(queue.peek().map(|p| p.inner[0]), Some(5));
        assert_eq!(queue.len(), 1);
        queue.clear();
        assert!(queue.peek().is_none());
    }
}

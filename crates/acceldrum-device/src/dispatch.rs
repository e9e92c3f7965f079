use std::collections::HashMap;

use acceldrum_frame::{ConfigureKind, ConfigurePacket, InnerPayload, Packet, PacketType};
use acceldrum_transport::ByteLink;

use crate::control::{respond, Controls};
use crate::error::Result;
use crate::serial::SerialManager;

type Handler = Box<dyn FnMut(&Packet) + Send>;

/// Counters kept by the [`Dispatcher`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub dispatched: u64,
    pub replies: u64,
    pub ignored: u64,
}

/// Routes inbound packets by type, one per invocation.
///
/// `Configure` packets go through the control table; other types go to a
/// registered handler or are ignored.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<PacketType, Handler>,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `packet_type` to `handler`, replacing any earlier handler.
    ///
    /// `Configure` always goes through the control table and cannot be
    /// overridden here.
    pub fn on<F>(&mut self, packet_type: PacketType, handler: F)
    where
        F: FnMut(&Packet) + Send + 'static,
    {
        self.handlers.insert(packet_type, Box::new(handler));
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Pop one packet and route it. Returns its type, or `None` when the
    /// queue was empty.
    ///
    /// A `Reset` request re-initialises `serial` before the reply is sent.
    pub fn dispatch_one<L, C>(
        &mut self,
        serial: &mut SerialManager<L>,
        controls: &mut C,
    ) -> Result<Option<u32>>
    where
        L: ByteLink,
        C: Controls + ?Sized,
    {
        let Some(packet) = serial.try_dequeue() else {
            return Ok(None);
        };
        self.stats.dispatched += 1;

        match packet.packet_type() {
            Some(PacketType::Configure) => {
                let request = ConfigurePacket::decode_inner(&packet.inner);
                if let Some(reply) = respond(controls, &request)? {
                    if request.kind() == Some(ConfigureKind::Reset) {
                        serial.init()?;
                    }
                    serial.send_typed(&reply)?;
                    self.stats.replies += 1;
                } else {
                    self.stats.ignored += 1;
                }
            }
            Some(packet_type) => match self.handlers.get_mut(&packet_type) {
                Some(handler) => handler(&packet),
                None => {
                    self.stats.ignored += 1;
                    tracing::trace!(packet_type = packet_type.name(), "no handler, ignored");
                }
            },
            None => {
                self.stats.ignored += 1;
                tracing::trace!(raw_type = packet.raw_type, "unknown type, ignored");
            }
        }

        Ok(Some(packet.raw_type))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("stats", &self.stats)
            .finish()
    }
}

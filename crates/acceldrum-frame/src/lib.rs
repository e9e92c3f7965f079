//! Fixed-size, self-synchronising packet framing over byte-stream links.
//!
//! Every frame is exactly [`FRAME_SIZE`] bytes:
//! - A 4-byte little-endian packet type
//! - A 48-byte payload region, interpreted per type
//! - A 4-byte CRC-32 over type and payload
//! - An 8-byte magic trailer used to find frame boundaries
//!
//! The receiver needs no delimiters and no handshake: it resynchronises on
//! the trailer after garbage or lost bytes.

pub mod checksum;
pub mod codec;
pub mod control;
pub mod error;
pub mod payload;
pub mod queue;
pub mod receiver;
pub mod ring;
pub mod text;
pub mod writer;

pub use checksum::{checksum, Crc32};
pub use codec::{
    is_valid_type, FrameConfig, Packet, PacketType, DEFAULT_BYTES_PER_POLL, FRAME_SIZE,
    INNER_SIZE, MAGIC,
};
pub use control::{
    AccelRange, ConfigureKind, ConfigurePacket, ConfigureValue, GyroRange, Settings,
    CONFIGURE_DATA_SIZE,
};
pub use error::{FrameError, Result};
pub use payload::{
    AccelPacket, InnerPayload, Payload, RawAccelPacket, RawSample, TextPacket,
    RAW_SAMPLES_PER_PACKET, TEXT_CAPACITY,
};
pub use queue::{Enqueued, InboundQueue, OverflowPolicy, INBOUND_CAPACITY};
pub use receiver::{FrameReceiver, LinkStats, PollSummary};
pub use ring::Ring;
pub use text::{text_line_packets, text_packets, TextAssembler};
pub use writer::{FrameWriter, SendPolicy};

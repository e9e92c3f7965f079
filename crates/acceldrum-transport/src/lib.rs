//! Byte-stream link abstraction for the acceldrum serial protocol.
//!
//! The protocol runs over links with no framing and no flow control. This
//! crate provides the [`ByteLink`] trait every higher layer is written
//! against, plus concrete links:
//! - [`MemoryLink`] connected in-memory pairs (tests, simulation)
//! - [`StreamLink`] over any non-blocking `Read + Write`
//! - serial devices via [`open_serial`]

pub mod error;
pub mod memory;
pub mod serial;
pub mod stream;
pub mod traits;

pub use error::{Result, TransportError};
pub use memory::MemoryLink;
pub use serial::{open_serial, SerialConfig, SerialLink, DEFAULT_BAUD};
pub use stream::StreamLink;
pub use traits::{ByteLink, MAX_DISCARD};

//! Self-synchronising serial packet protocol for IMU drum controllers.
//!
//! acceldrum moves fixed 64-byte, checksummed frames over plain byte links
//! with no delimiters and no handshake. The receiver finds frame boundaries
//! from a trailing magic word and recovers on its own after noise.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte link abstraction (in-memory pairs, serial devices)
//! - [`frame`]: Packet codec, receiver, inbound queue and transmitter
//! - [`device`]: Serial manager, scheduler, dispatch and the device run loop
//!   (behind the `device` feature)

/// Re-export transport types.
pub mod transport {
    pub use acceldrum_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use acceldrum_frame::*;
}

/// Re-export device types (requires `device` feature).
#[cfg(feature = "device")]
pub mod device {
    pub use acceldrum_device::*;
}

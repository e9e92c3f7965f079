use acceldrum_transport::TransportError;

/// Errors that can occur while encoding, sending or decoding packets.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The packet type is a sentinel (`None`/`Count`) or unknown.
    #[error("invalid packet type {0}")]
    InvalidType(u32),

    /// The payload does not fill the inner region exactly.
    #[error("payload size mismatch ({size} bytes, expected {expected})")]
    PayloadSizeMismatch { size: usize, expected: usize },

    /// No typed payload layout exists for this packet type.
    #[error("no payload layout for packet type {0}")]
    UnsupportedPayload(u32),

    /// The underlying link failed.
    #[error("link error: {0}")]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, FrameError>;

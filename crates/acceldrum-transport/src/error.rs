use std::path::PathBuf;

/// Errors that can occur on a byte link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the serial device.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The peer stopped accepting bytes before a write completed.
    #[error("link stalled after writing {written} of {total} bytes")]
    Stalled { written: usize, total: usize },

    /// An I/O error occurred on the link.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The other end of the link is gone.
    #[error("link closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;

use std::io::{ErrorKind, Read, Write};

use crate::error::{Result, TransportError};
use crate::traits::ByteLink;

/// Default number of `WouldBlock` retries before a write is reported stalled.
pub const DEFAULT_WRITE_RETRIES: usize = 1024;

/// Adapts any non-blocking `Read + Write` stream into a [`ByteLink`].
///
/// `WouldBlock`, `TimedOut` and `Interrupted` on read mean "nothing pending".
/// Writes retry a bounded number of times on `WouldBlock` or `TimedOut` so a
/// stuck peer can never wedge the caller.
pub struct StreamLink<T> {
    inner: T,
    write_retries: usize,
}

impl<T: Read + Write> StreamLink<T> {
    /// Wrap a stream with the default write retry budget.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            write_retries: DEFAULT_WRITE_RETRIES,
        }
    }

    /// Override the write retry budget.
    pub fn with_write_retries(mut self, retries: usize) -> Self {
        self.write_retries = retries;
        self
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the link and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read + Write> ByteLink for StreamLink<T> {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.inner.read(buf) {
            Ok(n) => Ok(n),
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        let mut retries = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    retries += 1;
                    if retries > self.write_retries {
                        return Err(TransportError::Stalled {
                            written: offset,
                            total: bytes.len(),
                        });
                    }
                    std::thread::yield_now();
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                // Non-blocking descriptors drain on their own.
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

impl<T> std::fmt::Debug for StreamLink<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamLink")
            .field("write_retries", &self.write_retries)
            .finish_non_exhaustive()
    }
}

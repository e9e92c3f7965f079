use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::error::{Result, TransportError};
use crate::traits::ByteLink;

type Pipe = Arc<Mutex<VecDeque<u8>>>;

/// One end of an in-memory, full-duplex byte link.
///
/// Created in connected pairs with [`MemoryLink::pair`]. Bytes written on one
/// end become readable on the other. Both ends may live on different threads.
///
/// Each end owns its input pipe and only weakly refers to the peer's, so a
/// write fails with [`TransportError::Closed`] once every handle to the peer
/// end is gone. Clones share one end.
#[derive(Clone)]
pub struct MemoryLink {
    rx: Pipe,
    tx: Weak<Mutex<VecDeque<u8>>>,
}

impl MemoryLink {
    /// Create two connected ends.
    pub fn pair() -> (Self, Self) {
        let a_rx: Pipe = Arc::default();
        let b_rx: Pipe = Arc::default();
        let a = Self {
            tx: Arc::downgrade(&b_rx),
            rx: a_rx,
        };
        let b = Self {
            tx: Arc::downgrade(&a.rx),
            rx: b_rx,
        };
        (a, b)
    }

    /// Inject bytes into this end's input as if the peer had sent them.
    pub fn feed(&self, bytes: &[u8]) {
        lock(&self.rx).extend(bytes.iter().copied());
    }

    /// Number of bytes waiting to be read on this end.
    pub fn pending(&self) -> usize {
        lock(&self.rx).len()
    }

    /// Number of bytes written by this end that the peer has not read yet.
    ///
    /// Zero once the peer is gone.
    pub fn in_flight(&self) -> usize {
        self.tx.upgrade().map_or(0, |tx| lock(&tx).len())
    }
}

impl ByteLink for MemoryLink {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut rx = lock(&self.rx);
        let n = buf.len().min(rx.len());
        for (slot, byte) in buf.iter_mut().zip(rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let tx = self.tx.upgrade().ok_or(TransportError::Closed)?;
        lock(&tx).extend(bytes.iter().copied());
        Ok(())
    }
}

impl std::fmt::Debug for MemoryLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLink")
            .field("pending", &self.pending())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

// A panicking peer must not take the link down with it; the byte queue is
// always structurally valid.
fn lock(pipe: &Pipe) -> MutexGuard<'_, VecDeque<u8>> {
    pipe.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

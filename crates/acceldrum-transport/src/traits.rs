use crate::error::Result;

/// Upper bound on bytes thrown away by [`ByteLink::discard_input`].
pub const MAX_DISCARD: usize = 64 * 1024;

/// A byte-oriented, unframed, best-effort link.
///
/// Implementations must never block: reads return whatever is pending right
/// now (possibly nothing) and writes hand the bytes to the OS or peer and
/// return. There is no flow control and no delimiter; framing is entirely the
/// caller's job.
pub trait ByteLink {
    /// Copy currently pending input into `buf`.
    ///
    /// Returns `Ok(0)` when nothing is available. Never returns more than
    /// `buf.len()`, so callers bound consumption by sizing `buf`.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Hand the whole buffer to the link.
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Push buffered output towards the peer.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Drop whatever input is pending, up to [`MAX_DISCARD`] bytes.
    ///
    /// Returns the number of bytes discarded.
    fn discard_input(&mut self) -> Result<usize> {
        let mut scratch = [0u8; 256];
        let mut discarded = 0usize;
        while discarded < MAX_DISCARD {
            let want = scratch.len().min(MAX_DISCARD - discarded);
            let n = self.read_available(&mut scratch[..want])?;
            if n == 0 {
                break;
            }
            discarded += n;
        }
        Ok(discarded)
    }
}

impl<L: ByteLink + ?Sized> ByteLink for &mut L {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_available(buf)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_all(bytes)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn discard_input(&mut self) -> Result<usize> {
        (**self).discard_input()
    }
}

impl<L: ByteLink + ?Sized> ByteLink for Box<L> {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_available(buf)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_all(bytes)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn discard_input(&mut self) -> Result<usize> {
        (**self).discard_input()
    }
}

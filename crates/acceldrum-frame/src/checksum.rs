//! Incremental CRC-32 (IEEE 802.3 polynomial) used on both ends of the link.

/// Stateful CRC-32 accumulator.
///
/// Sender and receiver each own one so a send issued from a handler never
/// disturbs a validation in progress.
#[derive(Clone, Default)]
pub struct Crc32 {
    hasher: crc32fast::Hasher,
}

impl Crc32 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to the empty-input state.
    pub fn restart(&mut self) {
        self.hasher.reset();
    }

    /// Fold `bytes` into the running checksum.
    pub fn add(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Current digest. Does not change the accumulator.
    pub fn calc(&self) -> u32 {
        self.hasher.clone().finalize()
    }
}

impl std::fmt::Debug for Crc32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Crc32({:#010X})", self.calc())
    }
}

/// One-shot CRC-32 of `data`.
pub fn checksum(data: &[u8]) -> u32 {
    let mut crc = Crc32::new();
    crc.add(data);
    crc.calc()
}

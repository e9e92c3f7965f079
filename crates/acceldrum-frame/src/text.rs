//! Arbitrary-length text over fixed-size `Text` frames.

use crate::payload::{TextPacket, TEXT_CAPACITY};

/// Longest message a [`TextAssembler`] buffers before cutting it short.
pub const MAX_TEXT_LEN: usize = 64 * 1024;

/// Split `text` into chunks. `has_next` is set on every chunk but the last.
///
/// Empty input yields no chunks.
pub fn text_packets(text: &[u8]) -> impl Iterator<Item = TextPacket> + '_ {
    let count = text.len().div_ceil(TEXT_CAPACITY);
    text.chunks(TEXT_CAPACITY)
        .enumerate()
        .map(move |(i, chunk)| TextPacket::new(chunk, i + 1 < count))
}

/// Like [`text_packets`], followed by a chunk holding a single `\n`.
pub fn text_line_packets(text: &[u8]) -> impl Iterator<Item = TextPacket> + '_ {
    text.chunks(TEXT_CAPACITY)
        .map(|chunk| TextPacket::new(chunk, true))
        .chain(std::iter::once(TextPacket::new(b"\n", false)))
}

/// Rebuilds messages from consecutive `Text` chunks.
#[derive(Debug, Default)]
pub struct TextAssembler {
    buf: Vec<u8>,
    truncated: bool,
}

impl TextAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk; returns the message once a chunk without `has_next`
    /// arrives. An empty final chunk ends a buffered message; an empty chunk
    /// with nothing buffered is ignored. NUL bytes become spaces and invalid
    /// UTF-8 is replaced.
    pub fn push(&mut self, chunk: &TextPacket) -> Option<String> {
        let text = chunk.text();
        if text.is_empty() && (chunk.has_next || self.buf.is_empty()) {
            return None;
        }

        let room = MAX_TEXT_LEN - self.buf.len();
        if text.len() > room {
            if !self.truncated {
                tracing::debug!(limit = MAX_TEXT_LEN, "text message truncated");
            }
            self.truncated = true;
        }
        self.buf.extend_from_slice(&text[..text.len().min(room)]);

        if chunk.has_next {
            return None;
        }

        let message = String::from_utf8_lossy(&self.buf).replace('\0', " ");
        self.buf.clear();
        self.truncated = false;
        Some(message)
    }

    /// Bytes collected for an unfinished message.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn reset(&mut self) {
        self.buf.clear();
        self.truncated = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassemble(chunks: impl Iterator<Item = TextPacket>) -> Vec<String> {
        let mut assembler = TextAssembler::new();
        chunks.filter_map(|c| assembler.push(&c)).collect()
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks: Vec<_> = text_packets(b"hello").collect();
        assert_eq!(chunks.len(), 1);
        assert!(!chunks[0].has_next);
        assert_eq!(chunks[0].text(), b"hello");
    }

    #[test]
    fn empty_text_sends_nothing() {
        assert_eq!(text_packets(b"").count(), 0);
    }

    #[test]
    fn exact_multiple_ends_without_continuation() {
        let text = vec![b'a'; TEXT_CAPACITY * 2];
        let chunks: Vec<_> = text_packets(&text).collect();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].has_next);
        assert!(!chunks[1].has_next);
    }

    #[test]
    fn long_text_reassembles() {
        let text: String = (0..200).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        assert_eq!(reassemble(text_packets(text.as_bytes())), vec![text]);
    }

    #[test]
    fn line_variant_appends_newline_chunk() {
        let chunks: Vec<_> = text_line_packets(b"ready").collect();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].has_next);
        assert_eq!(chunks[1].text(), b"\n");
        assert_eq!(reassemble(chunks.into_iter()), vec!["ready\n".to_string()]);
    }

    #[test]
    fn nul_bytes_become_spaces() {
        assert_eq!(reassemble(text_packets(b"a\0b")), vec!["a b".to_string()]);
    }

    #[test]
    fn empty_final_chunk_ends_message() {
        let mut assembler = TextAssembler::new();
        assert!(assembler.push(&TextPacket::new(b"hello ", true)).is_none());
        assert!(assembler.push(&TextPacket::new(b"", true)).is_none());
        assert_eq!(assembler.pending(), 6);

        let message = assembler.push(&TextPacket::new(b"", false));
        assert_eq!(message.as_deref(), Some("hello "));
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn lone_empty_chunk_is_ignored() {
        let mut assembler = TextAssembler::new();
        assert!(assembler.push(&TextPacket::new(b"", false)).is_none());
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn oversized_message_is_cut_at_limit() {
        let mut assembler = TextAssembler::new();
        let chunk = TextPacket::new(&[b'z'; TEXT_CAPACITY], true);
        for _ in 0..(MAX_TEXT_LEN / TEXT_CAPACITY + 10) {
            assert!(assembler.push(&chunk).is_none());
        }
        assert_eq!(assembler.pending(), MAX_TEXT_LEN);
        let message = assembler.push(&TextPacket::new(b"!", false)).unwrap();
        assert_eq!(message.len(), MAX_TEXT_LEN);
        assert_eq!(assembler.pending(), 0);
    }
}

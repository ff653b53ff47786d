use crate::constants::SAMPLE_SIZE;
use bytes::BytesMut;
use tracing::trace;

/// Rebuilds 4-byte sample words from arbitrarily split byte chunks.
///
/// Bytes that do not yet complete a word are kept and prefixed to the next
/// chunk, so the words emitted over the lifetime of a reassembler followed by
/// its remainder always equal the concatenation of every chunk pushed into it.
///
/// One instance per stream: the remainder belongs to exactly one byte source.
#[derive(Debug, Default)]
pub struct WordReassembler {
    pending: BytesMut,
}

impl WordReassembler {
    pub fn new() -> Self {
        Self {
            pending: BytesMut::with_capacity(SAMPLE_SIZE),
        }
    }

    /// Append `chunk` and return every word it completes, oldest first.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<u32> {
        if chunk.is_empty() {
            return Vec::new();
        }

        self.pending.extend_from_slice(chunk);
        let aligned_len = self.pending.len() - self.pending.len() % SAMPLE_SIZE;
        let aligned = self.pending.split_to(aligned_len);

        trace!(
            chunk_len = chunk.len(),
            words = aligned_len / SAMPLE_SIZE,
            remainder = self.pending.len(),
            "Reassembled chunk"
        );

        aligned
            .chunks_exact(SAMPLE_SIZE)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    /// Bytes carried over to the next chunk (0..=3).
    pub fn remainder(&self) -> &[u8] {
        &self.pending
    }

    /// Drop any partial word, e.g. after the stream was restarted.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_chunks_accumulate() {
        let mut reassembler = WordReassembler::new();
        assert!(reassembler.push(&[0x01]).is_empty());
        assert!(reassembler.push(&[0x02, 0x03]).is_empty());
        assert_eq!(reassembler.remainder(), &[0x01, 0x02, 0x03]);

        assert_eq!(reassembler.push(&[0x04]), vec![0x0403_0201]);
        assert!(reassembler.remainder().is_empty());
    }

    #[test]
    fn test_clear_drops_partial_word() {
        let mut reassembler = WordReassembler::new();
        reassembler.push(&[0xAA, 0xBB]);
        reassembler.clear();
        assert_eq!(reassembler.push(&[1, 0, 0, 0]), vec![1]);
    }
}

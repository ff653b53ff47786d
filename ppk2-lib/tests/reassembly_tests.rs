//! Tests for lossless word reassembly across arbitrary chunk boundaries

mod common;

use common::*;
use ppk2_lib::WordReassembler;
use proptest::prelude::*;

/// Push `chunks` in order; return all emitted words and the final remainder
fn reassemble<'a>(chunks: impl IntoIterator<Item = &'a [u8]>) -> (Vec<u32>, Vec<u8>) {
    let mut reassembler = WordReassembler::new();
    let mut words = Vec::new();
    for chunk in chunks {
        words.extend(reassembler.push(chunk));
    }
    (words, reassembler.remainder().to_vec())
}

fn split_at_points(data: &[u8], mut points: Vec<usize>) -> Vec<&[u8]> {
    points.sort_unstable();
    let mut chunks = Vec::new();
    let mut start = 0;
    for point in points {
        chunks.push(&data[start..point]);
        start = point;
    }
    chunks.push(&data[start..]);
    chunks
}

#[test]
fn test_split_chunks_match_single_chunk() {
    let data = b"AAAABBBB";
    let (whole, whole_rem) = reassemble([&data[..]]);
    let chunks: [&[u8]; 5] = [b"A", b"A", b"A", b"ABB", b"BB"];
    let (split, split_rem) = reassemble(chunks);

    assert_eq!(whole, vec![u32::from_le_bytes(*b"AAAA"), u32::from_le_bytes(*b"BBBB")]);
    assert_eq!(split, whole);
    assert!(whole_rem.is_empty());
    assert!(split_rem.is_empty());
}

#[test]
fn test_every_two_way_split_is_lossless() {
    let data: Vec<u8> = (0u8..23).collect();
    let (reference, reference_rem) = reassemble([&data[..]]);
    assert_eq!(reference.len(), 5);
    assert_eq!(reference_rem, vec![20, 21, 22]);

    for offset in 0..=data.len() {
        let (words, rem) = reassemble([&data[..offset], &data[offset..]]);
        assert_eq!(words, reference, "split at {}", offset);
        assert_eq!(rem, reference_rem, "split at {}", offset);
    }
}

#[test]
fn test_single_byte_chunks() {
    let words = [0xDEAD_BEEF, 0x0123_4567, 0x89AB_CDEF];
    let mut data = words_to_bytes(&words);
    data.push(0x42);

    let (emitted, rem) = reassemble(data.chunks(1));
    assert_eq!(emitted, words);
    assert_eq!(rem, vec![0x42]);
}

#[test]
fn test_empty_chunk_is_noop() {
    let mut reassembler = WordReassembler::new();
    assert!(reassembler.push(&[]).is_empty());
    assert!(reassembler.remainder().is_empty());

    assert_eq!(reassembler.push(&[1, 2, 3, 4, 5, 6]), vec![0x0403_0201]);
    assert!(reassembler.push(&[]).is_empty());
    assert_eq!(reassembler.remainder(), &[5, 6]);
}

#[test]
fn test_words_are_little_endian() {
    let mut reassembler = WordReassembler::new();
    assert_eq!(reassembler.push(&hex::decode("78563412").unwrap()), vec![0x1234_5678]);
}

proptest! {
    #[test]
    fn prop_reassembly_is_lossless(
        data in proptest::collection::vec(any::<u8>(), 0..256),
        cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..16),
    ) {
        let points = cuts.iter().map(|c| c.index(data.len() + 1)).collect();
        let (words, rem) = reassemble(split_at_points(&data, points));

        let mut rebuilt = words_to_bytes(&words);
        rebuilt.extend_from_slice(&rem);
        prop_assert_eq!(&rebuilt, &data);
        prop_assert_eq!(words.len(), data.len() / 4);
        prop_assert!(rem.len() < 4);

        let (reference, _) = reassemble([&data[..]]);
        prop_assert_eq!(words, reference);
    }
}

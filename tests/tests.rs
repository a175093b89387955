//! Tests.

use more_asserts::assert_le;
use ndlz::fastcpy::{fastcopy, safecopy};
use ndlz::{
    compress, decompress, decompress_into, decompressed_shape, get_maximum_output_size,
    BlockContext, CompressError, DecompressError,
};
use proptest::prelude::*;

/// Compress and decompress a block, asserting byte identity and the
/// no-expansion guarantee. Returns the stream for record-level checks.
fn inverse(rows: u32, cols: u32, block: &[u8]) -> Vec<u8> {
    let ctx = BlockContext::new(rows, cols);
    let compressed = compress(&ctx, block).unwrap();
    assert_le!(compressed.len(), block.len());
    let restored = decompress(&compressed).unwrap();
    assert_eq!(block, &restored[..]);
    compressed
}

/// A `rows x cols` block tiled from one 8x8 cell.
fn tiled(rows: usize, cols: usize, base: &[u8]) -> Vec<u8> {
    assert_eq!(base.len(), 64);
    (0..rows * cols)
        .map(|i| base[(i / cols % 8) * 8 + i % cols % 8])
        .collect()
}

/// Eight constant rows with pairwise distinct values, the building block
/// for the row-match scenarios.
fn distinct_rows(first: u8) -> Vec<u8> {
    (0..64).map(|i| first + (i / 8) as u8).collect()
}

/// Swap a cell's rows for the given ones (each entry is one constant row
/// value).
fn rows_of(values: [u8; 8]) -> Vec<u8> {
    values.iter().flat_map(|&v| [v; 8]).collect()
}

#[test]
fn constant_block() {
    // Header plus a two byte record.
    let block = vec![0x5A; 64];
    let compressed = inverse(8, 8, &block);
    assert_eq!(compressed.len(), 11);
    assert_eq!(&compressed[9..], &[0x40, 0x5A]);
}

#[test]
fn vertical_cell_match() {
    // Bottom cell identical to the top cell: one literal record, then a
    // whole-cell back-reference to the literal bytes at position 10.
    let mut block: Vec<u8> = (0u8..64).collect();
    block.extend(0u8..64);
    let compressed = inverse(16, 8, &block);
    assert_eq!(compressed.len(), 9 + 65 + 3);
    assert_eq!(compressed[74], 0xC0);
    assert_eq!(u16::from_le_bytes([compressed[75], compressed[76]]), 64);
}

#[test]
fn horizontal_cell_match() {
    // Same as above but side by side.
    let block: Vec<u8> = (0..128).map(|i| ((i % 16 % 8) + (i / 16) * 8) as u8).collect();
    let compressed = inverse(8, 16, &block);
    assert_eq!(compressed.len(), 9 + 65 + 3);
    assert_eq!(compressed[74], 0xC0);
    assert_eq!(u16::from_le_bytes([compressed[75], compressed[76]]), 64);
}

#[test]
fn single_literal_cell_does_not_shrink() {
    // An 8x8 block with no redundancy cannot beat the 9 byte header.
    let block: Vec<u8> = (0u8..64).collect();
    assert_eq!(
        compress(&BlockContext::new(8, 8), &block),
        Err(CompressError::Incompressible)
    );
}

#[test]
fn padded_edges_9x9() {
    // 9x9: a full constant cell plus padded records of 8x1, 1x8 and 1x1.
    let mut block = vec![7u8; 81];
    for r in 0..9 {
        for c in 0..9 {
            if r == 8 || c == 8 {
                block[r * 9 + c] = (r * 9 + c) as u8;
            }
        }
    }
    let compressed = inverse(9, 9, &block);
    // 9 + (constant) 2 + (8x1) 9 + (1x8) 9 + (1x1) 2
    assert_eq!(compressed.len(), 31);
    assert_eq!(&compressed[9..11], &[0x40, 7]);
    // right edge, one column of 8
    assert_eq!(compressed[11], 0x00);
    let right: Vec<u8> = (0..8).map(|r| block[r * 9 + 8]).collect();
    assert_eq!(&compressed[12..20], &right[..]);
    // bottom edge, one row of 8
    assert_eq!(compressed[20], 0x00);
    assert_eq!(&compressed[21..29], &block[72..80]);
    // corner
    assert_eq!(&compressed[29..31], &[0x00, block[80]]);
}

#[test]
fn padded_edges_both_axes() {
    let base: Vec<u8> = (0u8..64).collect();
    let block = tiled(20, 20, &base);
    let compressed = inverse(20, 20, &block);
    // literal + 3 whole-cell matches + padded edge records
    assert_eq!(compressed.len(), 9 + 65 + 3 * 3 + 4 * 33 + 17);
}

#[test]
fn padding_does_not_leak() {
    // 12x12: a constant interior cell and varied edge bytes.
    let mut block = vec![9u8; 144];
    for r in 0..12 {
        for c in 0..12 {
            if r >= 8 || c >= 8 {
                block[r * 12 + c] = (r * 12 + c) as u8;
            }
        }
    }
    let compressed = compress(&BlockContext::new(12, 12), &block).unwrap();

    let mut output = vec![0xEE; 200];
    let written = decompress_into(&compressed, &mut output).unwrap();
    assert_eq!(written, 144);
    assert_eq!(&output[..144], &block[..]);
    // Bytes past the block are not touched.
    assert!(output[144..].iter().all(|&b| b == 0xEE));
}

#[test]
fn one_pair_match() {
    let mut block = distinct_rows(10);
    block.extend(rows_of([10, 11, 20, 21, 22, 23, 24, 25]));
    let compressed = inverse(16, 8, &block);
    // (17 << 3) | 0, offset back to the first literal row pair
    assert_eq!(compressed[74], 0x88);
    assert_eq!(u16::from_le_bytes([compressed[75], compressed[76]]), 64);
    assert_eq!(compressed.len(), 9 + 65 + 1 + 2 + 6 * 8);
}

#[test]
fn one_triple_match() {
    let mut block = distinct_rows(10);
    block.extend(rows_of([10, 11, 12, 20, 21, 22, 23, 24]));
    let compressed = inverse(16, 8, &block);
    // (21 << 3) | 0
    assert_eq!(compressed[74], 0xA8);
    assert_eq!(compressed.len(), 9 + 65 + 1 + 2 + 5 * 8);
}

#[test]
fn two_pair_match() {
    // Rows 0-1 and 3-4 hit; row 2 breaks any triple.
    let mut block = distinct_rows(10);
    block.extend(rows_of([10, 11, 30, 13, 14, 20, 21, 22]));
    let compressed = inverse(16, 8, &block);
    // (18 << 11) | (0 << 8) | (3 << 5), high byte first
    assert_eq!(compressed[74], 0x90);
    assert_eq!(compressed[75], 0x60);
    assert_eq!(u16::from_le_bytes([compressed[76], compressed[77]]), 64);
    assert_eq!(u16::from_le_bytes([compressed[78], compressed[79]]), 40);
    assert_eq!(compressed.len(), 9 + 65 + 2 + 4 + 4 * 8);
}

#[test]
fn three_pair_match() {
    let mut block = distinct_rows(10);
    block.extend(rows_of([10, 11, 30, 13, 14, 31, 16, 17]));
    let compressed = inverse(16, 8, &block);
    // (19 << 11) | (0 << 8) | (3 << 5) | (6 << 2)
    assert_eq!(compressed[74], 0x98);
    assert_eq!(compressed[75], 0x78);
    assert_eq!(compressed.len(), 9 + 65 + 2 + 6 + 2 * 8);
}

#[test]
fn two_triple_match() {
    let mut block = distinct_rows(10);
    block.extend(rows_of([10, 11, 12, 14, 15, 16, 20, 21]));
    let compressed = inverse(16, 8, &block);
    // (22 << 11) | (0 << 8) | (3 << 5)
    assert_eq!(compressed[74], 0xB0);
    assert_eq!(compressed[75], 0x60);
    assert_eq!(compressed.len(), 9 + 65 + 2 + 4 + 2 * 8);
}

#[test]
fn determinism() {
    let base: Vec<u8> = (0u8..64).map(|i| i.wrapping_mul(37)).collect();
    let block = tiled(24, 17, &base);
    let ctx = BlockContext::new(24, 17);
    let first = compress(&ctx, &block).unwrap();
    let second = compress(&ctx, &block).unwrap();
    assert_eq!(first, second);
}

#[test]
fn shape_helpers() {
    let block = vec![1u8; 128];
    let compressed = compress(&BlockContext::new(16, 8), &block).unwrap();
    assert_eq!(decompressed_shape(&compressed).unwrap(), (16, 8));
    assert_le!(compressed.len(), get_maximum_output_size(16, 8));
}

#[test]
fn decompress_rejects_garbage() {
    assert_eq!(
        decompress(&[]),
        Err(DecompressError::ExpectedAnotherByte)
    );
    // Sound header, bogus token.
    let mut stream = vec![2u8];
    stream.extend_from_slice(&8u32.to_le_bytes());
    stream.extend_from_slice(&8u32.to_le_bytes());
    stream.push(0x07);
    assert_eq!(
        decompress(&stream),
        Err(DecompressError::InvalidToken { token: 0x07 })
    );
}

#[test]
fn safecopy_overlap_law() {
    // safecopy(buf + pattern_len, buf, len) equals the byte-by-byte loop
    // for every period up to 64.
    let lens = (0usize..=512).chain((513..=4096).step_by(13)).chain([4095, 4096]);
    for pattern_len in 1usize..=64 {
        for len in lens.clone() {
            let mut buf = vec![0u8; pattern_len + len];
            for (i, b) in buf[..pattern_len].iter_mut().enumerate() {
                *b = (i as u8).wrapping_mul(73).wrapping_add(11);
            }
            let mut expected = buf.clone();
            for i in 0..len {
                expected[pattern_len + i] = expected[i];
            }
            let ret = safecopy(&mut buf, pattern_len, 0, len);
            assert_eq!(ret, pattern_len + len);
            assert_eq!(buf, expected, "pattern_len={} len={}", pattern_len, len);
        }
    }
}

#[test]
fn safecopy_single_byte_pattern() {
    let mut buf = vec![0u8; 32];
    buf[0] = b'A';
    safecopy(&mut buf, 1, 0, 31);
    assert_eq!(buf, vec![b'A'; 32]);
}

proptest! {
    #[test]
    fn fastcopy_nonoverlap_law(
        data in proptest::collection::vec(any::<u8>(), 64..1024),
        len_frac in 0usize..=100,
    ) {
        // Disjoint regions: fastcopy is memcpy.
        let len = data.len() / 2 * len_frac / 100;
        let out = data.len() - len;
        let mut buf = data.clone();
        let ret = fastcopy(&mut buf, out, 0, len);
        prop_assert_eq!(ret, out + len);
        prop_assert_eq!(&buf[out..], &data[..len]);
        prop_assert_eq!(&buf[..out], &data[..out]);
    }

    #[test]
    fn roundtrip_tiled_blocks(
        rows in 8usize..=40,
        cols in 8usize..=40,
        base in proptest::collection::vec(any::<u8>(), 64),
    ) {
        let block = tiled(rows, cols, &base);
        let ctx = BlockContext::new(rows as u32, cols as u32);
        match compress(&ctx, &block) {
            Ok(compressed) => {
                prop_assert!(compressed.len() <= block.len());
                let restored = decompress(&compressed).unwrap();
                prop_assert_eq!(restored, block);
            }
            // Blocks without enough redundancy to beat the header are the
            // caller's problem.
            Err(CompressError::Incompressible) => {}
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    #[test]
    fn roundtrip_noisy_blocks(
        base in proptest::collection::vec(any::<u8>(), 64),
        noise in proptest::collection::vec((0usize..1024, any::<u8>()), 0..12),
    ) {
        let mut block = tiled(32, 32, &base);
        for (pos, value) in noise {
            block[pos] = value;
        }
        let ctx = BlockContext::new(32, 32);
        match compress(&ctx, &block) {
            Ok(compressed) => {
                let restored = decompress(&compressed).unwrap();
                prop_assert_eq!(restored, block);
            }
            Err(CompressError::Incompressible) => {}
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }
}

//! The compression algorithm.
//!
//! The block is walked cell by cell in row-major cell order. For each full
//! 8x8 cell we look for redundancy against bytes already emitted, via three
//! hash tables keyed on the whole cell, on three consecutive rows and on
//! two consecutive rows. Only cells that end up stored as plain literals
//! feed the tables: that way every table entry points at verbatim bytes
//! that exist exactly in the stream, never at positions synthesized from
//! back-references, and the decoder can resolve offsets against its own
//! input.

use crate::block::hashtable::{hash_bytes, MatchTable};
use crate::block::{
    get_maximum_output_size, BlockContext, CompressError, Sink, CELL_SHAPE, CELL_SIZE,
    HEADER_SIZE, MATCH_ONE_PAIR, MATCH_ONE_TRIPLE, MATCH_THREE_PAIRS, MATCH_TWO_PAIRS,
    MATCH_TWO_TRIPLES, MAX_DISTANCE, TOKEN_CELL_MATCH, TOKEN_CONSTANT, TOKEN_LITERAL,
};
use crate::fastcpy::slice_copy;

/// Key lengths of the two row-group match classes.
const TRIPLE_LEN: usize = 3 * CELL_SHAPE;
const PAIR_LEN: usize = 2 * CELL_SHAPE;

/// A verified row-group match: the first row of the group inside the
/// current cell and the stream position of the referenced bytes.
#[derive(Debug, Clone, Copy)]
struct RowMatch {
    row: usize,
    pos: usize,
}

/// Byte-verify a probed row group against the emitted stream. The distance
/// is measured from the group's position within the cell record, like the
/// whole-cell rule; offsets themselves are always anchored at the token.
#[inline]
fn verify(
    table: &MatchTable,
    hash: usize,
    key: &[u8],
    stream: &[u8],
    anchor: usize,
    key_start: usize,
    row: usize,
) -> Option<RowMatch> {
    let pos = table.get(hash);
    debug_assert!(pos != 0);
    let referenced = stream.get(pos..pos + key.len())?;
    if referenced != key {
        return None;
    }
    let distance = anchor + key_start - pos;
    if distance == 0 || distance >= MAX_DISTANCE {
        return None;
    }
    Some(RowMatch { row, pos })
}

/// Encode one full 8x8 cell. The caller has already checked that at least
/// `CELL_SIZE + 1` bytes of output remain, which covers every record form.
fn encode_cell(
    cell: &[u8; CELL_SIZE],
    op: &mut Sink,
    tab_cell: &mut MatchTable,
    tab_triple: &mut MatchTable,
    tab_pair: &mut MatchTable,
) {
    let anchor = op.pos();

    // All 64 bytes equal: constant cell.
    if cell.iter().all(|&b| b == cell[0]) {
        op.push(TOKEN_CONSTANT);
        op.push(cell[0]);
        return;
    }

    let cell_hash = hash_bytes(&cell[..]);
    let cell_ref = {
        let stream = op.filled();
        let pos = tab_cell.get(cell_hash);
        if pos != 0 && stream[pos..pos + CELL_SIZE] == cell[..] {
            let distance = anchor - pos;
            (distance != 0 && distance < MAX_DISTANCE).then_some(pos)
        } else {
            None
        }
    };
    if let Some(pos) = cell_ref {
        op.push(TOKEN_CELL_MATCH);
        op.extend_from_slice(&((anchor - pos) as u16).to_le_bytes());
        return;
    }

    // Row triples. New references are staged as (hash, position-plus-one)
    // and only committed if the cell falls through to the literal path.
    let mut staged_triple = [(0usize, 0u32); 6];
    let mut one_triple: Option<RowMatch> = None;
    let mut two_triples: Option<(RowMatch, RowMatch)> = None;
    {
        let stream = op.filled();
        'scan: for i in 0..CELL_SHAPE - 2 {
            let start = i * CELL_SHAPE;
            let key = &cell[start..start + TRIPLE_LEN];
            let hash = hash_bytes(key);
            if tab_triple.get(hash) == 0 {
                staged_triple[i] = (hash, (anchor + 1 + start) as u32);
                continue;
            }
            let Some(first) = verify(tab_triple, hash, key, stream, anchor, start, i) else {
                continue;
            };
            one_triple = Some(first);
            // A second triple must be disjoint from the first.
            for i2 in i + 3..CELL_SHAPE - 2 {
                let start2 = i2 * CELL_SHAPE;
                let key2 = &cell[start2..start2 + TRIPLE_LEN];
                let hash2 = hash_bytes(key2);
                if tab_triple.get(hash2) == 0 {
                    continue;
                }
                if let Some(second) = verify(tab_triple, hash2, key2, stream, anchor, start2, i2) {
                    two_triples = Some((first, second));
                    break 'scan;
                }
            }
        }
    }
    if let Some((first, second)) = two_triples {
        let token = ((MATCH_TWO_TRIPLES as u16) << 11)
            | ((first.row as u16) << 8)
            | ((second.row as u16) << 5);
        op.extend_from_slice(&token.to_be_bytes());
        op.extend_from_slice(&((anchor - first.pos) as u16).to_le_bytes());
        op.extend_from_slice(&((anchor - second.pos) as u16).to_le_bytes());
        let (r1, r2) = (first.row, second.row);
        for l in 0..CELL_SHAPE {
            if l < r1 || l > r2 + 2 || (l > r1 + 2 && l < r2) {
                op.extend_from_slice(&cell[l * CELL_SHAPE..(l + 1) * CELL_SHAPE]);
            }
        }
        return;
    }

    // Row pairs. Chains of two and three mutually disjoint pairs are
    // searched from every first hit; results only ever upgrade.
    let mut staged_pair = [(0usize, 0u32); 7];
    let mut one_pair: Option<RowMatch> = None;
    let mut two_pairs: Option<(RowMatch, RowMatch)> = None;
    let mut three_pairs: Option<(RowMatch, RowMatch, RowMatch)> = None;
    {
        let stream = op.filled();
        'scan: for i in 0..CELL_SHAPE - 1 {
            let start = i * CELL_SHAPE;
            let key = &cell[start..start + PAIR_LEN];
            let hash = hash_bytes(key);
            if tab_pair.get(hash) == 0 {
                staged_pair[i] = (hash, (anchor + 1 + start) as u32);
                continue;
            }
            let Some(first) = verify(tab_pair, hash, key, stream, anchor, start, i) else {
                continue;
            };
            one_pair = Some(first);
            for i2 in i + 2..CELL_SHAPE - 1 {
                let start2 = i2 * CELL_SHAPE;
                let key2 = &cell[start2..start2 + PAIR_LEN];
                let hash2 = hash_bytes(key2);
                if tab_pair.get(hash2) == 0 {
                    continue;
                }
                let Some(second) = verify(tab_pair, hash2, key2, stream, anchor, start2, i2)
                else {
                    continue;
                };
                two_pairs = Some((first, second));
                for i3 in i2 + 2..CELL_SHAPE - 1 {
                    let start3 = i3 * CELL_SHAPE;
                    let key3 = &cell[start3..start3 + PAIR_LEN];
                    let hash3 = hash_bytes(key3);
                    if tab_pair.get(hash3) == 0 {
                        continue;
                    }
                    if let Some(third) =
                        verify(tab_pair, hash3, key3, stream, anchor, start3, i3)
                    {
                        three_pairs = Some((first, second, third));
                        break 'scan;
                    }
                }
            }
        }
    }

    if let Some((first, second, third)) = three_pairs {
        let token = ((MATCH_THREE_PAIRS as u16) << 11)
            | ((first.row as u16) << 8)
            | ((second.row as u16) << 5)
            | ((third.row as u16) << 2);
        op.extend_from_slice(&token.to_be_bytes());
        op.extend_from_slice(&((anchor - first.pos) as u16).to_le_bytes());
        op.extend_from_slice(&((anchor - second.pos) as u16).to_le_bytes());
        op.extend_from_slice(&((anchor - third.pos) as u16).to_le_bytes());
        let (r1, r2, r3) = (first.row, second.row, third.row);
        for l in 0..CELL_SHAPE {
            if l < r1 || l > r3 + 1 || (l > r1 + 1 && l < r2) || (l > r2 + 1 && l < r3) {
                op.extend_from_slice(&cell[l * CELL_SHAPE..(l + 1) * CELL_SHAPE]);
            }
        }
        return;
    }

    if let Some((first, second)) = two_pairs {
        let token = ((MATCH_TWO_PAIRS as u16) << 11)
            | ((first.row as u16) << 8)
            | ((second.row as u16) << 5);
        op.extend_from_slice(&token.to_be_bytes());
        op.extend_from_slice(&((anchor - first.pos) as u16).to_le_bytes());
        op.extend_from_slice(&((anchor - second.pos) as u16).to_le_bytes());
        let (r1, r2) = (first.row, second.row);
        for l in 0..CELL_SHAPE {
            if l < r1 || l > r2 + 1 || (l > r1 + 1 && l < r2) {
                op.extend_from_slice(&cell[l * CELL_SHAPE..(l + 1) * CELL_SHAPE]);
            }
        }
        return;
    }

    if let Some(m) = one_triple {
        op.push((MATCH_ONE_TRIPLE << 3) | m.row as u8);
        op.extend_from_slice(&((anchor - m.pos) as u16).to_le_bytes());
        for l in 0..CELL_SHAPE {
            if l < m.row || l > m.row + 2 {
                op.extend_from_slice(&cell[l * CELL_SHAPE..(l + 1) * CELL_SHAPE]);
            }
        }
        return;
    }

    if let Some(m) = one_pair {
        op.push((MATCH_ONE_PAIR << 3) | m.row as u8);
        op.extend_from_slice(&((anchor - m.pos) as u16).to_le_bytes());
        for l in 0..CELL_SHAPE {
            if l < m.row || l > m.row + 1 {
                op.extend_from_slice(&cell[l * CELL_SHAPE..(l + 1) * CELL_SHAPE]);
            }
        }
        return;
    }

    // No match class fired: store the cell verbatim and commit the staged
    // references, which now point at bytes that really are in the stream.
    tab_cell.put(cell_hash, (anchor + 1) as u32);
    for (hash, pos) in staged_triple {
        if pos != 0 {
            tab_triple.put(hash, pos);
        }
    }
    for (hash, pos) in staged_pair {
        if pos != 0 {
            tab_pair.put(hash, pos);
        }
    }
    op.push(TOKEN_LITERAL);
    op.extend_from_slice(&cell[..]);
}

/// Compress the 2-D block `input` of shape `ctx.blockshape` into `output`.
///
/// Returns the number of bytes written. [`CompressError::Incompressible`]
/// and a mid-block [`CompressError::OutputTooSmall`] mean the block did not
/// shrink; callers should fall back to storing it uncompressed.
pub fn compress_into(
    ctx: &BlockContext,
    input: &[u8],
    output: &mut [u8],
) -> Result<usize, CompressError> {
    if ctx.ndim != 2 {
        return Err(CompressError::UnsupportedNdim { ndim: ctx.ndim });
    }
    if ctx.leftover {
        return Err(CompressError::LeftoverBlock);
    }
    let rows = ctx.rows();
    let cols = ctx.cols();
    let block_len = rows * cols;
    if input.len() != block_len {
        return Err(CompressError::LengthMismatch {
            expected: block_len,
            actual: input.len(),
        });
    }
    if input.len() < CELL_SIZE {
        return Err(CompressError::BlockTooSmall { len: input.len() });
    }
    if output.len() < HEADER_SIZE {
        return Err(CompressError::OutputTooSmall {
            needed: HEADER_SIZE,
            capacity: output.len(),
        });
    }
    // Minimum room for a fully literal encoding.
    let overhead = 17 + (block_len / CELL_SIZE - 1) * 2;
    if output.len() < overhead {
        return Err(CompressError::OutputTooSmall {
            needed: overhead,
            capacity: output.len(),
        });
    }

    let mut tab_cell = MatchTable::new();
    let mut tab_triple = MatchTable::new();
    let mut tab_pair = MatchTable::new();

    let mut op = Sink::from(output);
    op.push(ctx.ndim);
    op.extend_from_slice(&ctx.blockshape[0].to_le_bytes());
    op.extend_from_slice(&ctx.blockshape[1].to_le_bytes());

    let cell_rows = rows.div_ceil(CELL_SHAPE);
    let cell_cols = cols.div_ceil(CELL_SHAPE);

    let mut cell = [0u8; CELL_SIZE];
    for ci in 0..cell_rows {
        for cj in 0..cell_cols {
            if op.pos() + CELL_SIZE + 1 > op.capacity() {
                return Err(CompressError::OutputTooSmall {
                    needed: op.pos() + CELL_SIZE + 1,
                    capacity: op.capacity(),
                });
            }
            let origin = ci * CELL_SHAPE * cols + cj * CELL_SHAPE;
            let padded = (rows % CELL_SHAPE != 0 && ci == cell_rows - 1)
                || (cols % CELL_SHAPE != 0 && cj == cell_cols - 1);
            if padded {
                // Boundary cell: stored verbatim, truncated to its logical
                // extent, and kept out of the match tables.
                let pad_r = if ci == cell_rows - 1 {
                    rows - ci * CELL_SHAPE
                } else {
                    CELL_SHAPE
                };
                let pad_c = if cj == cell_cols - 1 {
                    cols - cj * CELL_SHAPE
                } else {
                    CELL_SHAPE
                };
                op.push(TOKEN_LITERAL);
                for r in 0..pad_r {
                    let row = origin + r * cols;
                    op.extend_from_slice(&input[row..row + pad_c]);
                }
            } else {
                for r in 0..CELL_SHAPE {
                    let row = origin + r * cols;
                    slice_copy(
                        &input[row..row + CELL_SHAPE],
                        &mut cell[r * CELL_SHAPE..(r + 1) * CELL_SHAPE],
                    );
                }
                encode_cell(&cell, &mut op, &mut tab_cell, &mut tab_triple, &mut tab_pair);
            }
            if op.pos() > input.len() {
                return Err(CompressError::Incompressible);
            }
        }
    }

    Ok(op.pos())
}

/// Compress the block into a freshly allocated `Vec`.
#[inline]
pub fn compress(ctx: &BlockContext, input: &[u8]) -> Result<Vec<u8>, CompressError> {
    let mut compressed = vec![0u8; get_maximum_output_size(ctx.rows(), ctx.cols())];
    let len = compress_into(ctx, input, &mut compressed)?;
    compressed.truncate(len);
    Ok(compressed)
}

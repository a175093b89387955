/*!

2-D block format.

A block is a `rows x cols` byte array, tiled into 8x8 cells in row-major
cell order. The stream starts with a 9 byte header (`ndim` as one byte, then
`rows` and `cols` as little-endian u32), followed by one record per cell:

| token                         | extra bytes                         | cell form |
|-------------------------------|-------------------------------------|-----------|
| `0x00`                        | 64 (or `pad_r * pad_c`) literals    | literal / padded |
| `0x40`                        | 1 value byte                        | constant  |
| `0xC0`                        | u16le offset                        | whole-cell back-reference |
| `(17 << 3) \| i`              | offset + 6 literal rows             | one row pair at `i` |
| `(21 << 3) \| i`              | offset + 5 literal rows             | one row triple at `i` |
| `(18 << 11) \| (i << 8) \| (i' << 5)` | 2 offsets + 4 literal rows  | two row pairs |
| `(19 << 11) \| (i << 8) \| (i' << 5) \| (i'' << 2)` | 3 offsets + 2 literal rows | three row pairs |
| `(22 << 11) \| (i << 8) \| (i' << 5)` | 2 offsets + 2 literal rows  | two row triples |

Two-byte tokens go on the wire high byte first; everything else multi-byte
is little-endian. Offsets count back from the position of the cell's token
byte to verbatim literal bytes emitted earlier in the stream.

*/

pub mod compress;
pub mod decompress;
pub mod hashtable;

use core::fmt;

use crate::fastcpy::slice_copy;

/// Cells are 8x8.
pub(crate) const CELL_SHAPE: usize = 8;
pub(crate) const CELL_SIZE: usize = CELL_SHAPE * CELL_SHAPE;

/// Offsets are u16; a distance of 0 means "no match", so the addressable
/// window is one short of 64k.
pub(crate) const MAX_DISTANCE: usize = 65535;

/// `ndim` byte plus two u32 extents.
pub(crate) const HEADER_SIZE: usize = 1 + 2 * 4;

pub(crate) const TOKEN_LITERAL: u8 = 0x00;
pub(crate) const TOKEN_CONSTANT: u8 = 0x40;
pub(crate) const TOKEN_CELL_MATCH: u8 = 0xC0;

/// Discriminants carried in the top bits of row-match tokens
/// (`token >> 3` for one-byte forms, composite `>> 11` for two-byte forms).
pub(crate) const MATCH_ONE_PAIR: u8 = 17;
pub(crate) const MATCH_TWO_PAIRS: u8 = 18;
pub(crate) const MATCH_THREE_PAIRS: u8 = 19;
pub(crate) const MATCH_ONE_TRIPLE: u8 = 21;
pub(crate) const MATCH_TWO_TRIPLES: u8 = 22;

/// Per-call compression parameters: the declared block shape plus the
/// caller-side flags the codec has to reject on.
///
/// `blockshape` is `[rows, cols]`. `leftover` marks a partial trailing
/// block, which this layer does not handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockContext {
    pub ndim: u8,
    pub blockshape: [u32; 2],
    pub leftover: bool,
}

impl BlockContext {
    /// Context for a full 2-D block of `rows x cols` bytes.
    pub fn new(rows: u32, cols: u32) -> Self {
        BlockContext {
            ndim: 2,
            blockshape: [rows, cols],
            leftover: false,
        }
    }

    #[inline]
    pub(crate) fn rows(&self) -> usize {
        self.blockshape[0] as usize
    }

    #[inline]
    pub(crate) fn cols(&self) -> usize {
        self.blockshape[1] as usize
    }
}

/// Worst-case compressed size for a `rows x cols` block: the header plus a
/// fully literal record (token + 64 bytes) for every cell.
pub fn get_maximum_output_size(rows: usize, cols: usize) -> usize {
    let cell_rows = rows.div_ceil(CELL_SHAPE);
    let cell_cols = cols.div_ceil(CELL_SHAPE);
    HEADER_SIZE + cell_rows * cell_cols * (1 + CELL_SIZE)
}

/// An error representing an input the compressor rejects or cannot shrink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressError {
    /// The context describes a dimensionality other than 2.
    UnsupportedNdim { ndim: u8 },
    /// Input length does not equal `rows * cols`.
    LengthMismatch { expected: usize, actual: usize },
    /// The context flags a partial trailing block.
    LeftoverBlock,
    /// The block is smaller than a single 8x8 cell.
    BlockTooSmall { len: usize },
    /// The output buffer cannot hold the encoding.
    OutputTooSmall { needed: usize, capacity: usize },
    /// The encoded stream would match or exceed the input size; the caller
    /// should store the block uncompressed.
    Incompressible,
}

impl fmt::Display for CompressError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompressError::UnsupportedNdim { ndim } => {
                write!(f, "this codec only works for 2 dimensions, got {}", ndim)
            }
            CompressError::LengthMismatch { expected, actual } => write!(
                f,
                "input length {} does not match the declared block size {}",
                actual, expected
            ),
            CompressError::LeftoverBlock => f.write_str("leftover blocks are not supported"),
            CompressError::BlockTooSmall { len } => {
                write!(f, "block of {} bytes is smaller than one cell", len)
            }
            CompressError::OutputTooSmall { needed, capacity } => write!(
                f,
                "output ({}) is too small for the encoded block, {}",
                capacity, needed
            ),
            CompressError::Incompressible => {
                f.write_str("compressed data would be bigger than the input")
            }
        }
    }
}

impl std::error::Error for CompressError {}

/// An error representing invalid compressed data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecompressError {
    /// Expected another byte, but none found.
    ExpectedAnotherByte,
    /// The header describes a dimensionality other than 2.
    UnsupportedNdim { ndim: u8 },
    /// The header describes an empty or overflowing block shape.
    InvalidShape,
    /// A cell record starts with a token outside the format table.
    InvalidToken { token: u8 },
    /// A back-reference points before the start of the stream.
    OffsetOutOfBounds,
    /// Output is too small for the decompressed block.
    OutputTooSmall { expected: usize, actual: usize },
}

impl fmt::Display for DecompressError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecompressError::ExpectedAnotherByte => {
                f.write_str("expected another byte, found none")
            }
            DecompressError::UnsupportedNdim { ndim } => {
                write!(f, "this codec only works for 2 dimensions, got {}", ndim)
            }
            DecompressError::InvalidShape => f.write_str("invalid block shape in header"),
            DecompressError::InvalidToken { token } => {
                write!(f, "invalid token: {}", token)
            }
            DecompressError::OffsetOutOfBounds => {
                f.write_str("the offset to copy is not contained in the compressed stream")
            }
            DecompressError::OutputTooSmall { expected, actual } => write!(
                f,
                "output ({}) is too small for the decompressed data, {}",
                actual, expected
            ),
        }
    }
}

impl std::error::Error for DecompressError {}

/// Sink is the target the encoder emits into: a preallocated slice plus a
/// write position. Bytes `[..pos]` are the stream written so far, which the
/// match verifier reads back.
pub(crate) struct Sink<'a> {
    output: &'a mut [u8],
    pos: usize,
}

impl<'a> From<&'a mut [u8]> for Sink<'a> {
    fn from(output: &'a mut [u8]) -> Self {
        Sink { output, pos: 0 }
    }
}

impl<'a> Sink<'a> {
    #[inline]
    pub fn push(&mut self, byte: u8) {
        self.output[self.pos] = byte;
        self.pos += 1;
    }

    #[inline]
    pub fn extend_from_slice(&mut self, data: &[u8]) {
        slice_copy(data, &mut self.output[self.pos..self.pos + data.len()]);
        self.pos += data.len();
    }

    /// The stream emitted so far.
    #[inline]
    pub fn filled(&self) -> &[u8] {
        &self.output[..self.pos]
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.output.len()
    }
}

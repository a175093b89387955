/*! Pure Rust implementation of a 2-D block codec, no unsafe.

Compresses fixed-shape blocks of bytes by looking for redundancy between
places that are close in the plane, not just close in the linear stream:
blocks are tiled into 8x8 cells and each cell is matched whole, by row
triples or by row pairs against cells emitted earlier, falling back to
constant-fill or literal records.

Compression is worthwhile only when the block actually shrinks; a block
without 2-D redundancy comes back as [`CompressError::Incompressible`] and
should be stored as-is by the caller.

# Examples
```
use ndlz::{compress, decompress, BlockContext};

// 16x8 block whose lower cell repeats rows of the upper cell.
let block: Vec<u8> = (0..128).map(|i| (i % 7) as u8).collect();
let ctx = BlockContext::new(16, 8);
let compressed = compress(&ctx, &block).unwrap();
let restored = decompress(&compressed).unwrap();
assert_eq!(block, restored);
```
*/

pub mod block;
pub mod fastcpy;

pub use block::compress::{compress, compress_into};
pub use block::decompress::{decompress, decompress_into, decompressed_shape};
pub use block::{get_maximum_output_size, BlockContext, CompressError, DecompressError};

//! Match tables used by the compression to map hashed cell fragments to
//! their position in the emitted stream.
//!
//! Entries follow the "position-plus-one" convention: a stored value is the
//! stream index of the first verbatim byte of the recorded fragment (which
//! sits right after a literal token, so it is always past the 9 byte
//! header), and `0` marks a vacant slot. This avoids a separate occupancy
//! bitmap.

use core::hash::Hasher;

use twox_hash::XxHash32;

/// All match classes hash with the same seed; only the key length differs.
const HASH_SEED: u32 = 1;

/// log2 of the table size.
const HASH_LOG: u32 = 12;

/// Table index: the high 12 bits of the XXH32 digest.
#[inline]
pub(crate) fn hash_bytes(bytes: &[u8]) -> usize {
    let mut hasher = XxHash32::with_seed(HASH_SEED);
    hasher.write(bytes);
    (hasher.finish() as u32 >> (32 - HASH_LOG)) as usize
}

/// One `2^12`-entry table of u32 stream positions, vacant-at-zero.
pub(crate) struct MatchTable {
    entries: Box<[u32]>,
}

impl MatchTable {
    pub fn new() -> Self {
        MatchTable {
            entries: vec![0u32; 1 << HASH_LOG].into_boxed_slice(),
        }
    }

    /// Recorded position for `hash`, or 0 if the slot is vacant.
    #[inline]
    pub fn get(&self, hash: usize) -> usize {
        self.entries[hash] as usize
    }

    #[inline]
    pub fn put(&mut self, hash: usize, pos: u32) {
        self.entries[hash] = pos;
    }
}

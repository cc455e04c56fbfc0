//! Block metadata codec (spec §4.1).
//!
//! A header (and, for some free blocks, an identical footer) is a single
//! 4-byte word packed as:
//!
//! ```text
//! bits[31:3] = size with its low 3 bits cleared (size is always a
//!              multiple of 8)
//! bit[2]     = prev_small
//! bit[1]     = prev_alloc
//! bit[0]     = alloc
//! ```
//!
//! This module is pure bit arithmetic on that word; it never touches
//! memory. `nav.rs` is the module that reads/writes a header at an actual
//! address.

/// The raw on-disk/on-heap representation of a header or footer.
pub type Word = u32;

const ALLOC_BIT: Word = 1 << 0;
const PREV_ALLOC_BIT: Word = 1 << 1;
const PREV_SMALL_BIT: Word = 1 << 2;
const SIZE_MASK: Word = !0x7;

/// Packs a `(size, alloc, prev_alloc, prev_small)` tuple into a header word.
///
/// `size` must already be a multiple of 8; its low 3 bits are discarded
/// rather than validated, matching how the bits are laid out in memory.
#[inline]
pub const fn pack(size: usize, alloc: bool, prev_alloc: bool, prev_small: bool) -> Word {
    (size as Word & SIZE_MASK)
        | (prev_small as Word) << 2
        | (prev_alloc as Word) << 1
        | (alloc as Word)
}

/// Extracts the block size (in bytes) from a header word.
#[inline]
pub const fn size_of(word: Word) -> usize {
    (word & SIZE_MASK) as usize
}

/// Extracts the `alloc` bit: whether this block is currently allocated.
#[inline]
pub const fn is_alloc(word: Word) -> bool {
    word & ALLOC_BIT != 0
}

/// Extracts the `prev_alloc` bit: whether the physically preceding block
/// is allocated.
#[inline]
pub const fn prev_alloc_of(word: Word) -> bool {
    word & PREV_ALLOC_BIT != 0
}

/// Extracts the `prev_small` bit: whether the physically preceding block
/// is exactly [`crate::config::MIN_BLOCK_SIZE`].
#[inline]
pub const fn prev_small_of(word: Word) -> bool {
    word & PREV_SMALL_BIT != 0
}

/// Returns `word` with its `prev_alloc` bit set to `bit`, every other field
/// unchanged.
#[inline]
pub const fn set_prev_alloc(word: Word, bit: bool) -> Word {
    if bit {
        word | PREV_ALLOC_BIT
    } else {
        word & !PREV_ALLOC_BIT
    }
}

/// Returns `word` with its `prev_small` bit set to `bit`, every other field
/// unchanged.
#[inline]
pub const fn set_prev_small(word: Word, bit: bool) -> Word {
    if bit {
        word | PREV_SMALL_BIT
    } else {
        word & !PREV_SMALL_BIT
    }
}

/// Unpacks a header word back into its four logical fields. Only used by
/// tests and the consistency checker; the hot path reads fields
/// individually via the accessors above.
#[cfg(test)]
pub const fn unpack(word: Word) -> (usize, bool, bool, bool) {
    (
        size_of(word),
        is_alloc(word),
        prev_alloc_of(word),
        prev_small_of(word),
    )
}

//! Heap navigator (spec §4.2).
//!
//! Given a payload pointer (`BlockPtr`), computes header/footer addresses
//! and walks to the next or previous physical block. Everything here is
//! raw pointer arithmetic plus the `header.rs` codec; it knows nothing
//! about the Free Index.

use crate::config::MIN_BLOCK_SIZE;
use crate::header::{self, Word};
use core::ptr;

/// A payload pointer: the address of a block's first user-visible byte.
pub type BlockPtr = *mut u8;

const WORD_SIZE: usize = core::mem::size_of::<Word>();

/// Address of `bp`'s header: `bp - 4`.
#[inline]
pub fn header_addr(bp: BlockPtr) -> *mut Word {
    unsafe { bp.sub(WORD_SIZE) as *mut Word }
}

/// Address of `bp`'s footer, given the block's `size`: `bp + size - 8`.
///
/// Only valid to dereference when the block is free and `size` exceeds
/// [`MIN_BLOCK_SIZE`] — callers that don't already know the block is in
/// that state must check first.
#[inline]
pub fn footer_addr(bp: BlockPtr, size: usize) -> *mut Word {
    unsafe { bp.add(size - 2 * WORD_SIZE) as *mut Word }
}

/// Reads the header word at `bp`.
#[inline]
pub unsafe fn read_header(bp: BlockPtr) -> Word {
    unsafe { ptr::read_unaligned(header_addr(bp)) }
}

/// Writes `word` as the header at `bp`.
#[inline]
pub unsafe fn write_header(bp: BlockPtr, word: Word) {
    unsafe { ptr::write_unaligned(header_addr(bp), word) }
}

/// Reads the footer word of a `size`-byte block at `bp`.
#[inline]
pub unsafe fn read_footer(bp: BlockPtr, size: usize) -> Word {
    unsafe { ptr::read_unaligned(footer_addr(bp, size)) }
}

/// Writes `word` as the footer of a `size`-byte block at `bp`.
#[inline]
pub unsafe fn write_footer(bp: BlockPtr, size: usize, word: Word) {
    unsafe { ptr::write_unaligned(footer_addr(bp, size), word) }
}

/// Writes `word` as both header and footer, when the block's size calls
/// for a footer (free and larger than [`MIN_BLOCK_SIZE`]). Centralizing
/// the two writes here is the "single helper" spec §9 asks for, so that
/// `prev_alloc`/`prev_small` can never be updated in just one of the two
/// copies.
#[inline]
pub unsafe fn write_boundary_tags(bp: BlockPtr, size: usize, word: Word, has_footer: bool) {
    unsafe {
        write_header(bp, word);
        if has_footer {
            write_footer(bp, size, word);
        }
    }
}

/// The size (in bytes) of the block at `bp`, read from its header.
#[inline]
pub unsafe fn size_of_block(bp: BlockPtr) -> usize {
    unsafe { header::size_of(read_header(bp)) }
}

/// Whether the block at `bp` is currently allocated.
#[inline]
pub unsafe fn is_alloc(bp: BlockPtr) -> bool {
    unsafe { header::is_alloc(read_header(bp)) }
}

/// Whether the block physically preceding `bp` is allocated.
#[inline]
pub unsafe fn prev_alloc(bp: BlockPtr) -> bool {
    unsafe { header::prev_alloc_of(read_header(bp)) }
}

/// Whether the block physically preceding `bp` is [`MIN_BLOCK_SIZE`].
#[inline]
pub unsafe fn prev_small(bp: BlockPtr) -> bool {
    unsafe { header::prev_small_of(read_header(bp)) }
}

/// The payload pointer of the block physically following `bp`.
#[inline]
pub unsafe fn next(bp: BlockPtr) -> BlockPtr {
    unsafe { bp.add(size_of_block(bp)) }
}

/// The payload pointer of the block physically preceding `bp`.
///
/// Uses `prev_small` to short-circuit the common case (no footer to read);
/// otherwise reads the predecessor's footer, which is guaranteed to exist
/// precisely because the predecessor is free and not of minimum size.
#[inline]
pub unsafe fn prev(bp: BlockPtr) -> BlockPtr {
    unsafe {
        if prev_small(bp) {
            bp.sub(MIN_BLOCK_SIZE)
        } else {
            let footer_word = ptr::read_unaligned(bp.sub(2 * WORD_SIZE) as *mut Word);
            let prev_size = header::size_of(footer_word);
            bp.sub(prev_size)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A small page-aligned byte arena standing in for a heap region, used
    /// to exercise navigator arithmetic without a real `Heap`.
    fn arena(len: usize) -> Vec<u8> {
        vec![0u8; len]
    }

    #[test]
    fn header_and_footer_addresses_bracket_the_block() {
        let mut mem = arena(64);
        // Pretend the block starts 4 bytes in, so header_addr stays in bounds.
        let bp = unsafe { mem.as_mut_ptr().add(4) };
        let size = 32;
        assert_eq!(header_addr(bp), unsafe { bp.sub(4) } as *mut Word);
        assert_eq!(footer_addr(bp, size), unsafe { bp.add(size - 8) } as *mut Word);
    }

    #[test]
    fn next_follows_the_header_encoded_size() {
        let mut mem = arena(128);
        let bp = unsafe { mem.as_mut_ptr().add(4) };
        unsafe { write_header(bp, header::pack(40, true, true, false)) };
        assert_eq!(unsafe { next(bp) }, unsafe { bp.add(40) });
    }

    #[test]
    fn prev_uses_prev_small_bit_to_skip_the_footer_read() {
        let mut mem = arena(128);
        let bp = unsafe { mem.as_mut_ptr().add(64) };
        unsafe { write_header(bp, header::pack(24, true, true, true)) };
        assert_eq!(unsafe { prev(bp) }, unsafe { bp.sub(MIN_BLOCK_SIZE) });
    }

    #[test]
    fn prev_reads_predecessor_footer_when_not_small() {
        let mut mem = arena(128);
        let bp = unsafe { mem.as_mut_ptr().add(64) };
        // Predecessor is free, size 48, so its footer sits at bp - 8.
        unsafe { ptr::write_unaligned(bp.sub(8) as *mut Word, header::pack(48, false, true, false)) };
        unsafe { write_header(bp, header::pack(24, true, false, false)) };
        assert_eq!(unsafe { prev(bp) }, unsafe { bp.sub(48) });
    }
}

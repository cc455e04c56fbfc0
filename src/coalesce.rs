//! Boundary-tag coalescer (spec §4.5).
//!
//! Merges a newly freed (or newly extended) block with whichever physical
//! neighbors are currently free, removing those neighbors from the Free
//! Index as it goes. Does **not** insert the merged result back into the
//! Free Index — per spec §4.7's literal `release` procedure, that is the
//! caller's responsibility once coalescing is done.

use crate::config::MIN_BLOCK_SIZE;
use crate::header;
use crate::heap::{Heap, HeapProvider};
use crate::index;
use crate::nav::{self, BlockPtr};

/// Merges `bp` with any free physical neighbors and returns the resulting
/// `(block, size)`. `bp` itself must not already be indexed in the Free
/// Index — only its neighbors are removed from it here.
pub fn coalesce<P: HeapProvider>(heap: &mut Heap<P>, bp: BlockPtr) -> (BlockPtr, usize) {
    let size = unsafe { nav::size_of_block(bp) };
    let own_word = unsafe { nav::read_header(bp) };
    let prev_alloc = header::prev_alloc_of(own_word);
    let prev_small = header::prev_small_of(own_word);

    let next_bp = unsafe { nav::next(bp) };
    let next_alloc = unsafe { nav::is_alloc(next_bp) };

    let (final_bp, final_size, final_prev_alloc, final_prev_small) = match (prev_alloc, next_alloc) {
        (true, true) => (bp, size, prev_alloc, prev_small),
        (true, false) => {
            let next_size = unsafe { nav::size_of_block(next_bp) };
            index::remove_free(heap, next_bp, next_size);
            (bp, size + next_size, prev_alloc, prev_small)
        }
        (false, true) => {
            let prev_bp = unsafe { nav::prev(bp) };
            let prev_size = unsafe { nav::size_of_block(prev_bp) };
            let prev_word = unsafe { nav::read_header(prev_bp) };
            index::remove_free(heap, prev_bp, prev_size);
            (
                prev_bp,
                prev_size + size,
                header::prev_alloc_of(prev_word),
                header::prev_small_of(prev_word),
            )
        }
        (false, false) => {
            let prev_bp = unsafe { nav::prev(bp) };
            let prev_size = unsafe { nav::size_of_block(prev_bp) };
            let prev_word = unsafe { nav::read_header(prev_bp) };
            let next_size = unsafe { nav::size_of_block(next_bp) };
            index::remove_free(heap, prev_bp, prev_size);
            index::remove_free(heap, next_bp, next_size);
            (
                prev_bp,
                prev_size + size + next_size,
                header::prev_alloc_of(prev_word),
                header::prev_small_of(prev_word),
            )
        }
    };

    let word = header::pack(final_size, false, final_prev_alloc, final_prev_small);
    let has_footer = final_size > MIN_BLOCK_SIZE;
    unsafe { nav::write_boundary_tags(final_bp, final_size, word, has_footer) };

    let successor = unsafe { nav::next(final_bp) };
    let successor_word = unsafe { nav::read_header(successor) };
    let successor_word = header::set_prev_alloc(successor_word, false);
    let successor_word = header::set_prev_small(successor_word, final_size == MIN_BLOCK_SIZE);
    unsafe { nav::write_header(successor, successor_word) };

    (final_bp, final_size)
}

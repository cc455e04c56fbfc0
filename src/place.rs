//! Placer/splitter (spec §4.6).
//!
//! Turns a free block found by the Free Index into an allocated block of
//! exactly the requested size, splitting off and re-indexing a residual
//! free block when there's enough left over to bother.

use crate::config::MIN_BLOCK_SIZE;
use crate::header;
use crate::heap::{Heap, HeapProvider};
use crate::index;
use crate::nav::{self, BlockPtr};

/// Allocates `requested_size` bytes out of the free block `bp`, which must
/// currently be indexed in the Free Index at `free_size` bytes. Returns
/// `bp`, now holding an allocated block of `requested_size` bytes.
pub fn place<P: HeapProvider>(
    heap: &mut Heap<P>,
    bp: BlockPtr,
    free_size: usize,
    requested_size: usize,
) -> BlockPtr {
    index::remove_free(heap, bp, free_size);
    place_unindexed(heap, bp, free_size, requested_size)
}

/// Same as [`place`], but for a block the caller has already removed from
/// (or never inserted into) the Free Index — e.g. an allocated block being
/// grown in place after absorbing a free neighbor the caller removed
/// itself.
pub fn place_unindexed<P: HeapProvider>(
    heap: &mut Heap<P>,
    bp: BlockPtr,
    free_size: usize,
    requested_size: usize,
) -> BlockPtr {
    debug_assert!(requested_size <= free_size);

    let own_word = unsafe { nav::read_header(bp) };
    let prev_alloc = header::prev_alloc_of(own_word);
    let prev_small = header::prev_small_of(own_word);

    let remainder_size = free_size - requested_size;
    if remainder_size >= MIN_BLOCK_SIZE {
        let alloc_word = header::pack(requested_size, true, prev_alloc, prev_small);
        unsafe { nav::write_boundary_tags(bp, requested_size, alloc_word, false) };

        let remainder_bp = unsafe { bp.add(requested_size) };
        let remainder_word = header::pack(remainder_size, false, true, requested_size == MIN_BLOCK_SIZE);
        let has_footer = remainder_size > MIN_BLOCK_SIZE;
        unsafe { nav::write_boundary_tags(remainder_bp, remainder_size, remainder_word, has_footer) };

        set_successor_prev_bits(remainder_bp, remainder_size, false, remainder_size == MIN_BLOCK_SIZE);
        index::insert_free(heap, remainder_bp, remainder_size);
    } else {
        let alloc_word = header::pack(free_size, true, prev_alloc, prev_small);
        unsafe { nav::write_boundary_tags(bp, free_size, alloc_word, false) };
        set_successor_prev_bits(bp, free_size, true, free_size == MIN_BLOCK_SIZE);
    }

    bp
}

/// Updates the block physically following the one at `bp` (of `size`
/// bytes) so its `prev_alloc`/`prev_small` bits describe `bp`'s new state.
fn set_successor_prev_bits(bp: BlockPtr, size: usize, prev_alloc: bool, prev_small: bool) {
    let successor = unsafe { bp.add(size) };
    let word = unsafe { nav::read_header(successor) };
    let word = header::set_prev_alloc(word, prev_alloc);
    let word = header::set_prev_small(word, prev_small);
    unsafe { nav::write_header(successor, word) };
}

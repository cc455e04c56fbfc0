//! The Free Index: the union of size-class bins and the size-keyed BST
//! (spec §2, §3 "Free Index invariants"). This module is the only place
//! that decides, by size, whether a free block lives in a bin or in the
//! tree — `bins.rs` and `tree.rs` never make that call themselves.

use crate::config::{self, THRESHOLD};
use crate::heap::{Heap, HeapProvider};
use crate::nav::BlockPtr;
use crate::{bins, tree};

/// Inserts a free block of size `size` into whichever part of the Free
/// Index it belongs in.
pub fn insert_free<P: HeapProvider>(heap: &mut Heap<P>, bp: BlockPtr, size: usize) {
    match config::size_class_index(size) {
        Some(idx) => bins::insert(heap, bp, idx),
        None => tree::insert(heap, bp, size),
    }
}

/// Removes a free block of size `size` from the Free Index. `bp` must
/// currently be indexed there.
pub fn remove_free<P: HeapProvider>(heap: &mut Heap<P>, bp: BlockPtr, size: usize) {
    match config::size_class_index(size) {
        Some(idx) => bins::remove(heap, bp, idx),
        None => tree::remove(heap, bp, size),
    }
}

/// Best-fit search across the whole Free Index: the smallest free block
/// whose size is `>= size`. Size-class bins are checked first (each is
/// O(1) to query, and is itself already an exact fit by construction),
/// then the tree is consulted for anything at or above [`THRESHOLD`].
pub fn find_fit<P: HeapProvider>(heap: &Heap<P>, size: usize) -> Option<(BlockPtr, usize)> {
    if let Some(idx) = config::size_class_index(size) {
        for probe_idx in idx..config::SIZE_CLASS_COUNT {
            if let Some(bp) = bins::head(heap, probe_idx) {
                let probe_size = config::MIN_BLOCK_SIZE + probe_idx * 8;
                return Some((bp, probe_size));
            }
        }
    }
    tree::find_fit(heap, size.max(THRESHOLD)).map(|bp| (bp, unsafe { crate::nav::size_of_block(bp) }))
}

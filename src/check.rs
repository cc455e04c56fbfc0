//! Heap consistency checker (spec §7, §8 "universal invariants").
//!
//! Walks the physical block chain and the Free Index independently and
//! cross-checks them. Meant for tests and the trace driver, not the hot
//! allocate/release path — it is the closest thing this crate has to a
//! reference re-derivation of every invariant the allocator is supposed to
//! maintain as a side effect of its bookkeeping.

use crate::config::{self, MIN_BLOCK_SIZE};
use crate::header;
use crate::heap::{Heap, HeapProvider};
use crate::links;
use crate::nav::{self, BlockPtr};
use crate::{bins, tree};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckError {
    #[error("block at {addr:#x} is not 8-byte aligned")]
    Misaligned { addr: usize },

    #[error("block at {addr:#x} has size {size}, below the minimum block size")]
    TooSmall { addr: usize, size: usize },

    #[error("free block at {addr:#x} has mismatched header/footer ({header:#x} != {footer:#x})")]
    FooterMismatch { addr: usize, header: u32, footer: u32 },

    #[error("free block at {addr:#x} is immediately followed by another free block at {next:#x}")]
    AdjacentFreeBlocks { addr: usize, next: usize },

    #[error("block at {addr:#x} has prev_alloc={claimed} but its predecessor's actual alloc state is {actual}")]
    PrevAllocMismatch { addr: usize, claimed: bool, actual: bool },

    #[error("block at {addr:#x} has prev_small={claimed} but its predecessor's actual size is {actual_size}")]
    PrevSmallMismatch { addr: usize, claimed: bool, actual_size: usize },

    #[error("walking the heap found {walked} free blocks but the Free Index holds {indexed}")]
    FreeBlockCountMismatch { walked: usize, indexed: usize },

    #[error("BST in-order traversal is not strictly increasing in size at {addr:#x}")]
    TreeOutOfOrder { addr: usize },

    #[error("BST node at {addr:#x} has a child whose parent link does not point back to it")]
    TreeLinkBroken { addr: usize },

    #[error("block at {addr:#x} is free but absent from both bins and tree")]
    FreeBlockNotIndexed { addr: usize },
}

/// Runs every invariant check spec.md §8 describes against the current
/// heap state. Returns the first violation found, if any.
pub fn check<P: HeapProvider>(heap: &Heap<P>) -> Result<(), CheckError> {
    check_physical_chain(heap)?;
    check_tree_shape(heap)?;
    check_index_membership(heap)?;
    Ok(())
}

/// Walks every physical block from the first real block to the epilogue,
/// checking alignment, minimum size, boundary-tag consistency, the
/// no-adjacent-free-blocks invariant, and that each block's `prev_alloc`/
/// `prev_small` bits describe its actual predecessor.
fn check_physical_chain<P: HeapProvider>(heap: &Heap<P>) -> Result<(), CheckError> {
    let first = first_block(heap);
    let mut bp = first;
    // The prologue is always allocated and is exactly MIN_BLOCK_SIZE, so
    // seed the walk as if it were the "previous" block rather than
    // skipping the first real block's adjacency check entirely.
    let mut prev_was_free = false;
    let mut prev_size = MIN_BLOCK_SIZE;

    loop {
        let addr = bp as usize;
        if addr % 8 != 0 {
            return Err(CheckError::Misaligned { addr });
        }

        let word = unsafe { nav::read_header(bp) };
        let size = header::size_of(word);
        let is_alloc = header::is_alloc(word);
        let is_epilogue = size == 0 && is_alloc;

        if !is_epilogue && size < MIN_BLOCK_SIZE {
            return Err(CheckError::TooSmall { addr, size });
        }

        if !is_epilogue && !is_alloc && size > MIN_BLOCK_SIZE {
            let footer = unsafe { nav::read_footer(bp, size) };
            if footer != word {
                return Err(CheckError::FooterMismatch { addr, header: word, footer });
            }
        }

        let claimed_prev_alloc = header::prev_alloc_of(word);
        if claimed_prev_alloc != !prev_was_free {
            return Err(CheckError::PrevAllocMismatch {
                addr,
                claimed: claimed_prev_alloc,
                actual: !prev_was_free,
            });
        }
        let claimed_prev_small = header::prev_small_of(word);
        let actual_prev_small = prev_size == MIN_BLOCK_SIZE;
        if prev_was_free && claimed_prev_small != actual_prev_small {
            return Err(CheckError::PrevSmallMismatch {
                addr,
                claimed: claimed_prev_small,
                actual_size: prev_size,
            });
        }
        if prev_was_free && !is_alloc && !is_epilogue {
            return Err(CheckError::AdjacentFreeBlocks { addr: bp as usize - prev_size, next: addr });
        }

        if is_epilogue {
            break;
        }

        prev_was_free = !is_alloc;
        prev_size = size;
        bp = unsafe { nav::next(bp) };
    }
    Ok(())
}

/// Verifies the BST is strictly increasing in in-order size and that every
/// parent/child pair agrees both ways.
fn check_tree_shape<P: HeapProvider>(heap: &Heap<P>) -> Result<(), CheckError> {
    let nodes = tree::in_order(heap);
    let mut last_size: Option<usize> = None;
    for &bp in &nodes {
        // Only tree nodes (same-size-list heads) carry tree links; chain
        // members have `pred.is_some()` and are skipped for ordering.
        if links::pred(heap.base(), bp).is_some() {
            continue;
        }
        let size = unsafe { nav::size_of_block(bp) };
        if let Some(last) = last_size {
            if size <= last {
                return Err(CheckError::TreeOutOfOrder { addr: bp as usize });
            }
        }
        last_size = Some(size);

        if let Some(l) = links::left(bp) {
            if links::parent(l) != Some(bp) {
                return Err(CheckError::TreeLinkBroken { addr: bp as usize });
            }
        }
        if let Some(r) = links::right(bp) {
            if links::parent(r) != Some(bp) {
                return Err(CheckError::TreeLinkBroken { addr: bp as usize });
            }
        }
    }
    Ok(())
}

/// Cross-checks the physical free-block population against the Free
/// Index: every free block found while walking the heap must be indexed
/// somewhere (a bin or the tree), and the two counts must match exactly.
fn check_index_membership<P: HeapProvider>(heap: &Heap<P>) -> Result<(), CheckError> {
    let mut indexed: HashSet<usize> = HashSet::new();
    for idx in 0..config::SIZE_CLASS_COUNT {
        let mut cur = bins::head(heap, idx);
        while let Some(bp) = cur {
            indexed.insert(bp as usize);
            cur = links::succ(heap.base(), bp);
        }
    }
    for bp in tree::in_order(heap) {
        indexed.insert(bp as usize);
    }

    let mut walked = 0usize;
    let mut bp = first_block(heap);
    loop {
        let word = unsafe { nav::read_header(bp) };
        let size = header::size_of(word);
        let is_alloc = header::is_alloc(word);
        if size == 0 && is_alloc {
            break;
        }
        if !is_alloc {
            walked += 1;
            if !indexed.contains(&(bp as usize)) {
                return Err(CheckError::FreeBlockNotIndexed { addr: bp as usize });
            }
        }
        bp = unsafe { nav::next(bp) };
    }

    if walked != indexed.len() {
        return Err(CheckError::FreeBlockCountMismatch { walked, indexed: indexed.len() });
    }
    Ok(())
}

/// The payload pointer of the first real (non-prologue) block.
fn first_block<P: HeapProvider>(heap: &Heap<P>) -> BlockPtr {
    unsafe { nav::next(heap.prologue_payload()) }
}

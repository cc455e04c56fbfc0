//! Public façade (spec §4.7): `allocate`, `release`, `resize`,
//! `zeroed_allocate`. Everything below this module is an implementation
//! detail; callers only ever touch an [`Allocator`].

use crate::align::align_up8;
use crate::config::{MIN_BLOCK_SIZE, WORD_SIZE};
use crate::header;
use crate::heap::{Heap, HeapProvider, SbrkHeap};
use crate::nav;
use crate::{coalesce, index, place};
use log::trace;

/// A heap-backed allocator. Generic over [`HeapProvider`] so tests can run
/// against a fake, in-memory heap instead of the real process break.
pub struct Allocator<P: HeapProvider> {
    heap: Heap<P>,
}

/// The allocator as it's actually used: backed by the real `sbrk(2)` break.
pub type SbrkAllocator = Allocator<SbrkHeap>;

impl<P: HeapProvider> Allocator<P> {
    pub fn new(provider: P) -> Self {
        Self { heap: Heap::new(provider) }
    }

    fn ensure_initialized(&mut self) -> bool {
        if !self.heap.is_initialized() {
            if self.heap.initialize().is_err() {
                return false;
            }
        }
        true
    }

    /// Block size (header + payload, no footer) needed to satisfy a
    /// `n`-byte allocation request.
    fn block_size_for(n: usize) -> usize {
        align_up8((n + WORD_SIZE).max(MIN_BLOCK_SIZE))
    }

    /// Allocates at least `n` bytes, returning a payload pointer, or a
    /// null pointer on `n == 0` or when the heap cannot be grown further.
    pub fn allocate(&mut self, n: usize) -> *mut u8 {
        if n == 0 || !self.ensure_initialized() {
            return core::ptr::null_mut();
        }

        let size = Self::block_size_for(n);
        let fit = match index::find_fit(&self.heap, size) {
            Some(fit) => Some(fit),
            None => {
                if self.heap.extend(size).is_err() {
                    return core::ptr::null_mut();
                }
                index::find_fit(&self.heap, size)
            }
        };

        let Some((bp, free_size)) = fit else {
            return core::ptr::null_mut();
        };

        let placed = place::place(&mut self.heap, bp, free_size, size);
        trace!("allocate({}) -> {:#x} (block size {})", n, placed as usize, size);
        placed
    }

    /// Frees the block at `p`. A no-op if `p` is null or not a pointer
    /// this allocator handed out (spec §7.2).
    pub fn release(&mut self, p: *mut u8) {
        if p.is_null() || !self.heap.contains(p) {
            return;
        }

        let size = unsafe { nav::size_of_block(p) };
        let word = unsafe { nav::read_header(p) };
        let freed_word = header::pack(
            size,
            false,
            header::prev_alloc_of(word),
            header::prev_small_of(word),
        );
        unsafe { nav::write_boundary_tags(p, size, freed_word, size > MIN_BLOCK_SIZE) };

        let (final_bp, final_size) = coalesce::coalesce(&mut self.heap, p);
        index::insert_free(&mut self.heap, final_bp, final_size);
        trace!("release({:#x}), merged block size {}", p as usize, final_size);
    }

    /// Resizes the block at `p` to hold `n` bytes, preserving its content
    /// up to `min(old, new)` bytes. `p == null` behaves like `allocate`;
    /// `n == 0` behaves like `release` and returns null.
    pub fn resize(&mut self, p: *mut u8, n: usize) -> *mut u8 {
        if p.is_null() {
            return self.allocate(n);
        }
        if n == 0 {
            self.release(p);
            return core::ptr::null_mut();
        }
        if !self.heap.contains(p) {
            return core::ptr::null_mut();
        }

        let old_size = unsafe { nav::size_of_block(p) };
        let new_size = Self::block_size_for(n);

        if new_size <= old_size {
            return p;
        }

        // Try to grow in place by absorbing a free, allocated successor.
        let next_bp = unsafe { nav::next(p) };
        if !unsafe { nav::is_alloc(next_bp) } {
            let next_size = unsafe { nav::size_of_block(next_bp) };
            if old_size + next_size >= new_size {
                index::remove_free(&mut self.heap, next_bp, next_size);
                let merged_size = old_size + next_size;
                let word = unsafe { nav::read_header(p) };
                let merged_word = header::pack(
                    merged_size,
                    true,
                    header::prev_alloc_of(word),
                    header::prev_small_of(word),
                );
                unsafe { nav::write_boundary_tags(p, merged_size, merged_word, false) };
                return place::place_unindexed(&mut self.heap, p, merged_size, new_size);
            }
        }

        let new_bp = self.allocate(n);
        if new_bp.is_null() {
            return core::ptr::null_mut();
        }
        let copy_len = old_size - WORD_SIZE;
        unsafe { core::ptr::copy_nonoverlapping(p, new_bp, copy_len) };
        self.release(p);
        new_bp
    }

    /// Allocates space for `k` elements of `n` bytes each, zero-initialized.
    /// Returns null on overflow of `k * n` or on allocation failure.
    pub fn zeroed_allocate(&mut self, k: usize, n: usize) -> *mut u8 {
        let Some(total) = k.checked_mul(n) else {
            return core::ptr::null_mut();
        };
        let p = self.allocate(total);
        if !p.is_null() {
            unsafe { core::ptr::write_bytes(p, 0, total) };
        }
        p
    }

    /// Runs the heap's internal consistency checker (spec §7, §8).
    pub fn check(&self) -> Result<(), crate::check::CheckError> {
        crate::check::check(&self.heap)
    }
}

impl Default for SbrkAllocator {
    fn default() -> Self {
        Self::new(SbrkHeap::new())
    }
}

//! The raw heap: provider abstraction, bin-array storage, prologue/epilogue
//! maintenance, and `sbrk`-backed growth (spec §4.7 initialize, §6 heap
//! provider, persisted layout).
//!
//! `Heap<P>` is the single encapsulated allocator value spec §9 asks for
//! instead of scattered globals: it owns the provider and the address of
//! the bins array (`mem_base`, i.e. `heap_low()`), and every other piece
//! of allocator state — the bin heads, the BST root, every block header —
//! lives inside the managed heap bytes themselves.

use crate::config::{BIN_COUNT, CHUNK_SIZE, MIN_BLOCK_SIZE, TREE_BIN_INDEX};
use crate::error::HeapError;
use crate::header;
use crate::nav::{self, BlockPtr};
use core::ptr;
use log::{debug, trace};

/// Raw access to a growable, contiguous, `sbrk`-like heap region.
///
/// This is the external collaborator spec.md §1 says is "specified only
/// by the interface the core consumes"; [`SbrkHeap`] is the concrete
/// POSIX realization of it.
pub trait HeapProvider {
    /// The lowest address ever handed out by this provider.
    fn heap_low(&self) -> usize;

    /// The current program break: the first address *not* owned by the
    /// heap.
    fn heap_high(&self) -> usize;

    /// Extends the heap by exactly `n` bytes, returning the address of
    /// the old break (i.e. the start of the newly available region).
    fn sbrk(&mut self, n: usize) -> Result<usize, HeapError>;
}

/// A [`HeapProvider`] backed by the POSIX `sbrk(2)` system call via `libc`.
#[derive(Debug, Default)]
pub struct SbrkHeap {
    low: usize,
    high: usize,
}

impl SbrkHeap {
    pub fn new() -> Self {
        Self { low: 0, high: 0 }
    }
}

impl HeapProvider for SbrkHeap {
    fn heap_low(&self) -> usize {
        self.low
    }

    fn heap_high(&self) -> usize {
        self.high
    }

    #[cfg(unix)]
    fn sbrk(&mut self, n: usize) -> Result<usize, HeapError> {
        let old = unsafe { libc::sbrk(n as libc::intptr_t) };
        if old as isize == -1 {
            return Err(HeapError::BrkFailed { requested: n });
        }
        let old_addr = old as usize;
        if self.low == 0 {
            self.low = old_addr;
        }
        self.high = old_addr + n;
        Ok(old_addr)
    }

    /// `sbrk(2)` is a POSIX call; there is no raw-break primitive to defer
    /// to on non-Unix targets.
    #[cfg(not(unix))]
    fn sbrk(&mut self, _n: usize) -> Result<usize, HeapError> {
        Err(HeapError::Unsupported)
    }
}

/// Rounds `addr` up to the smallest value `>= addr` that is congruent to
/// `residue` modulo 8. Used once, at `initialize`, to place the prologue
/// header such that the first real block's payload lands 8-byte aligned.
fn align_to_residue8(addr: usize, residue: usize) -> usize {
    let r = addr % 8;
    let advance = (residue + 8 - r) % 8;
    addr + advance
}

/// The allocator's view of the managed heap: a provider plus the address
/// of the bins array. Every allocate/release/resize/zeroed_allocate call
/// goes through a `Heap<P>`.
pub struct Heap<P: HeapProvider> {
    provider: P,
    mem_base: usize,
}

impl<P: HeapProvider> Heap<P> {
    pub fn new(provider: P) -> Self {
        Self { provider, mem_base: 0 }
    }

    pub fn is_initialized(&self) -> bool {
        self.mem_base != 0
    }

    pub fn base(&self) -> usize {
        self.mem_base
    }

    pub fn high(&self) -> usize {
        self.provider.heap_high()
    }

    /// The payload pointer of the prologue block. Recomputed from
    /// `mem_base` rather than stored, since it follows deterministically
    /// from the bins array size and the residue-8 padding `initialize`
    /// applies.
    pub fn prologue_payload(&self) -> BlockPtr {
        let after_bins = self.mem_base + BIN_COUNT * 4;
        let prologue_header = align_to_residue8(after_bins, 4);
        (prologue_header + 4) as BlockPtr
    }

    /// Whether `bp` could plausibly be a live payload pointer into this
    /// heap: inside `[first block, heap_high)` and 8-byte aligned. Used
    /// by the façade to silently ignore invalid pointers (spec §7.2).
    pub fn contains(&self, bp: BlockPtr) -> bool {
        if !self.is_initialized() {
            return false;
        }
        let addr = bp as usize;
        addr % 8 == 0 && addr > self.mem_base && addr < self.provider.heap_high()
    }

    fn bin_slot_ptr(&self, idx: usize) -> *mut u32 {
        debug_assert!(idx < BIN_COUNT);
        (self.mem_base + idx * 4) as *mut u32
    }

    /// Reads bin `idx`'s head (a size-class list head for `idx <
    /// TREE_BIN_INDEX`, the BST root for `idx == TREE_BIN_INDEX`).
    pub fn bin_head(&self, idx: usize) -> Option<BlockPtr> {
        let off = unsafe { ptr::read_unaligned(self.bin_slot_ptr(idx)) };
        if off == 0 {
            None
        } else {
            Some((self.mem_base + off as usize) as BlockPtr)
        }
    }

    /// Sets bin `idx`'s head.
    pub fn set_bin_head(&mut self, idx: usize, value: Option<BlockPtr>) {
        let off = value.map_or(0u32, |p| (p as usize - self.mem_base) as u32);
        unsafe { ptr::write_unaligned(self.bin_slot_ptr(idx), off) };
    }

    pub fn tree_root(&self) -> Option<BlockPtr> {
        self.bin_head(TREE_BIN_INDEX)
    }

    pub fn set_tree_root(&mut self, value: Option<BlockPtr>) {
        self.set_bin_head(TREE_BIN_INDEX, value)
    }

    /// The address of the epilogue's header: always the last word before
    /// the current break.
    fn epilogue_header_addr(&self) -> usize {
        self.provider.heap_high() - 4
    }

    /// The epilogue's (fictitious, zero-size) payload pointer.
    fn epilogue_payload(&self) -> BlockPtr {
        self.provider.heap_high() as BlockPtr
    }

    /// Sets up the bins array, the prologue, and the epilogue, then
    /// performs the first `extend` (spec §4.7 `initialize`).
    pub fn initialize(&mut self) -> Result<(), HeapError> {
        let bins_start = self.provider.sbrk(0)?;
        let after_bins = bins_start + BIN_COUNT * 4;
        // Prologue payload must sit 4 mod 8 so that `prologue_payload + 8
        // (prologue size) + 4 (header offset)` — the first real block's
        // payload — lands on an 8-byte boundary.
        let prologue_header = align_to_residue8(after_bins, 4);
        let pad = prologue_header - after_bins;
        let total = BIN_COUNT * 4 + pad + 2 * 4 /* prologue header+footer */ + 4 /* epilogue header */;

        let base = self.provider.sbrk(total)?;
        debug_assert_eq!(base, bins_start);
        self.mem_base = base;

        for i in 0..BIN_COUNT {
            self.set_bin_head(i, None);
        }

        let prologue_payload = self.prologue_payload();
        debug_assert_eq!(prologue_payload, (prologue_header + 4) as BlockPtr);
        let prologue_word = header::pack(MIN_BLOCK_SIZE, true, true, false);
        unsafe {
            nav::write_header(prologue_payload, prologue_word);
            nav::write_footer(prologue_payload, MIN_BLOCK_SIZE, prologue_word);
        }

        // The prologue is exactly MIN_BLOCK_SIZE, so the epilogue's
        // prev_small (which extend_raw seeds the first real block's header
        // from) must start true — the first real block's predecessor is
        // the prologue, not some future non-minimum-size block.
        let epilogue_word = header::pack(0, true, true, true);
        unsafe { nav::write_header(self.epilogue_payload(), epilogue_word) };

        debug!(
            "heap initialized: mem_base={:#x} prologue={:#x} epilogue={:#x}",
            self.mem_base,
            prologue_payload as usize,
            self.epilogue_payload() as usize
        );

        self.extend_raw(CHUNK_SIZE)?;
        Ok(())
    }

    /// Extends the heap by at least `min_size` bytes, writing a fresh
    /// free block that starts exactly where the old epilogue stood and a
    /// fresh epilogue after it. Does not coalesce or index the new block
    /// — that is `extend`'s job, one layer up, so this function stays a
    /// pure "grow the arena" primitive.
    fn extend_raw(&mut self, min_size: usize) -> Result<BlockPtr, HeapError> {
        let size = crate::align::align_up8(min_size.max(CHUNK_SIZE));

        let old_epilogue_word = unsafe { nav::read_header(self.epilogue_payload()) };
        let prev_alloc = header::prev_alloc_of(old_epilogue_word);
        let prev_small = header::prev_small_of(old_epilogue_word);

        let old_break = self.provider.sbrk(size)?;
        let new_bp = old_break as BlockPtr;

        let word = header::pack(size, false, prev_alloc, prev_small);
        let has_footer = size > MIN_BLOCK_SIZE;
        unsafe { nav::write_boundary_tags(new_bp, size, word, has_footer) };

        let new_epilogue_word = header::pack(0, true, false, size == MIN_BLOCK_SIZE);
        unsafe { nav::write_header(self.epilogue_payload(), new_epilogue_word) };

        trace!("extend_raw: +{} bytes at {:#x}", size, new_bp as usize);
        Ok(new_bp)
    }

    /// Grows the heap by at least `min_size` bytes, coalesces the new
    /// region against the previous tail if it was free, and inserts the
    /// (possibly merged) result into the Free Index. Returns nothing —
    /// callers re-run `find_fit`, which is guaranteed to succeed since
    /// the request was sized to fit.
    pub fn extend(&mut self, min_size: usize) -> Result<(), HeapError> {
        let bp = self.extend_raw(min_size)?;
        let (final_bp, final_size) = crate::coalesce::coalesce(self, bp);
        crate::index::insert_free(self, final_bp, final_size);
        Ok(())
    }
}

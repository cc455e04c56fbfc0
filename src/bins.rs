//! Size-class bins (spec §4.3).
//!
//! Bin `0` holds blocks of exactly [`crate::config::MIN_BLOCK_SIZE`] and,
//! because those blocks have no room for a predecessor offset, is a
//! *singly* linked list — `remove` there walks the list. Every other
//! size-class bin is a doubly linked list with O(1) insert and remove.

use crate::config::SIZE_CLASS_COUNT;
use crate::heap::{Heap, HeapProvider};
use crate::links;
use crate::nav::BlockPtr;

/// Whether bin `idx` is the singly-linked minimum-size bin.
#[inline]
fn is_singly_linked(idx: usize) -> bool {
    idx == 0
}

/// Prepends `bp` to size-class bin `idx`. O(1).
pub fn insert<P: HeapProvider>(heap: &mut Heap<P>, bp: BlockPtr, idx: usize) {
    debug_assert!(idx < SIZE_CLASS_COUNT);
    let base = heap.base();
    let old_head = heap.bin_head(idx);

    links::set_succ(base, bp, old_head);
    if !is_singly_linked(idx) {
        links::set_pred(base, bp, None);
        if let Some(head) = old_head {
            links::set_pred(base, head, Some(bp));
        }
    }
    heap.set_bin_head(idx, Some(bp));
}

/// Splices `bp` out of size-class bin `idx`. O(1) for every bin except
/// the minimum-size bin, which must walk its singly linked list.
pub fn remove<P: HeapProvider>(heap: &mut Heap<P>, bp: BlockPtr, idx: usize) {
    debug_assert!(idx < SIZE_CLASS_COUNT);
    let base = heap.base();

    if is_singly_linked(idx) {
        let head = heap.bin_head(idx);
        if head == Some(bp) {
            heap.set_bin_head(idx, links::succ(base, bp));
            return;
        }
        let mut cur = head.expect("bp must be present in its bin");
        loop {
            let next = links::succ(base, cur).expect("bp must be present in its bin");
            if next == bp {
                links::set_succ(base, cur, links::succ(base, bp));
                return;
            }
            cur = next;
        }
    }

    let pred = links::pred(base, bp);
    let succ = links::succ(base, bp);
    match pred {
        Some(p) => links::set_succ(base, p, succ),
        None => heap.set_bin_head(idx, succ),
    }
    if let Some(s) = succ {
        links::set_pred(base, s, pred);
    }
}

/// The head of size-class bin `idx`, if non-empty. Finding any block of
/// the exact size is O(1) — every list member is equally sized.
pub fn head<P: HeapProvider>(heap: &Heap<P>, idx: usize) -> Option<BlockPtr> {
    heap.bin_head(idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MIN_BLOCK_SIZE;
    use crate::header;
    use crate::nav;

    /// A fake [`HeapProvider`] over a `Vec<u8>` so bin tests don't touch
    /// the real process break.
    struct FakeProvider {
        mem: Vec<u8>,
        used: usize,
    }

    impl FakeProvider {
        fn new(cap: usize) -> Self {
            Self { mem: vec![0u8; cap], used: 0 }
        }
    }

    impl HeapProvider for FakeProvider {
        fn heap_low(&self) -> usize {
            self.mem.as_ptr() as usize
        }
        fn heap_high(&self) -> usize {
            self.mem.as_ptr() as usize + self.used
        }
        fn sbrk(&mut self, n: usize) -> Result<usize, crate::error::HeapError> {
            let old = self.heap_high();
            self.used += n;
            assert!(self.used <= self.mem.len(), "fake heap exhausted");
            Ok(old)
        }
    }

    fn fresh_heap(bytes: usize) -> Heap<FakeProvider> {
        let mut heap = Heap::new(FakeProvider::new(bytes));
        heap.initialize().unwrap();
        heap
    }

    fn make_free_block<P: HeapProvider>(heap: &Heap<P>, offset_from_base: usize, size: usize) -> BlockPtr {
        let bp = (heap.base() + offset_from_base) as BlockPtr;
        let word = header::pack(size, false, true, false);
        unsafe { nav::write_boundary_tags(bp, size, word, size > MIN_BLOCK_SIZE) };
        bp
    }

    #[test]
    fn insert_then_head_finds_the_block_in_a_doubly_linked_bin() {
        let mut heap = fresh_heap(4096);
        let idx = 1; // size class 16
        let bp = make_free_block(&heap, 512, 16);
        insert(&mut heap, bp, idx);
        assert_eq!(head(&heap, idx), Some(bp));
    }

    #[test]
    fn remove_head_of_doubly_linked_bin_promotes_successor() {
        let mut heap = fresh_heap(4096);
        let idx = 1;
        let a = make_free_block(&heap, 512, 16);
        let b = make_free_block(&heap, 560, 16);
        insert(&mut heap, a, idx);
        insert(&mut heap, b, idx);
        assert_eq!(head(&heap, idx), Some(b));

        remove(&mut heap, b, idx);
        assert_eq!(head(&heap, idx), Some(a));
        assert_eq!(links::pred(heap.base(), a), None);
    }

    #[test]
    fn remove_singly_linked_min_size_bin_walks_the_list() {
        let mut heap = fresh_heap(4096);
        let idx = 0; // MIN_BLOCK_SIZE, singly linked
        let a = make_free_block(&heap, 512, MIN_BLOCK_SIZE);
        let b = make_free_block(&heap, 520, MIN_BLOCK_SIZE);
        let c = make_free_block(&heap, 528, MIN_BLOCK_SIZE);
        insert(&mut heap, a, idx);
        insert(&mut heap, b, idx);
        insert(&mut heap, c, idx);
        // list is c -> b -> a
        remove(&mut heap, b, idx);
        assert_eq!(head(&heap, idx), Some(c));
        assert_eq!(links::succ(heap.base(), c), Some(a));
    }
}

//! Size-keyed BST of same-size free-block lists (spec §4.4).
//!
//! The tree is ordered on block size; no two tree *nodes* ever share a
//! size — same-size blocks chain off the node via the same-size-list
//! successor/predecessor instead, and the node is always that list's
//! head. Traversal and deletion are iterative (spec §9: "express tree
//! insert/remove/search iteratively... to avoid stack growth on
//! degenerate trees").

use crate::heap::{Heap, HeapProvider};
use crate::links;
use crate::nav::{self, BlockPtr};

/// Re-parents `new` into the tree slot `old` currently occupies (fixing
/// up the parent's child pointer, or the root, and `new`'s own parent
/// link). Does not touch `new`'s children — callers that need the whole
/// subtree moved call [`replace_node_in_tree`] instead.
fn splice_into_parent<P: HeapProvider>(heap: &mut Heap<P>, old: BlockPtr, new: Option<BlockPtr>) {
    match links::parent(old) {
        Some(p) => {
            if links::left(p) == Some(old) {
                links::set_left(p, new);
            } else {
                debug_assert_eq!(links::right(p), Some(old));
                links::set_right(p, new);
            }
        }
        None => heap.set_tree_root(new),
    }
    if let Some(n) = new {
        links::set_parent(n, links::parent(old));
    }
}

/// Moves `old`'s entire subtree (left child, right child, and slot in
/// its parent) onto `new`. Used when a same-size-list head is displaced:
/// by a freshly spliced-in block during `insert`, or by its own list
/// successor during `remove`.
fn replace_node_in_tree<P: HeapProvider>(heap: &mut Heap<P>, old: BlockPtr, new: BlockPtr) {
    let l = links::left(old);
    let r = links::right(old);
    links::set_left(new, l);
    links::set_right(new, r);
    if let Some(l) = l {
        links::set_parent(l, Some(new));
    }
    if let Some(r) = r {
        links::set_parent(r, Some(new));
    }
    splice_into_parent(heap, old, Some(new));
}

/// Inserts free block `bp` of size `size` into the tree.
pub fn insert<P: HeapProvider>(heap: &mut Heap<P>, bp: BlockPtr, size: usize) {
    let base = heap.base();
    links::set_left(bp, None);
    links::set_right(bp, None);
    links::set_succ(base, bp, None);
    links::set_pred(base, bp, None);

    let Some(root) = heap.tree_root() else {
        links::set_parent(bp, None);
        heap.set_tree_root(Some(bp));
        return;
    };

    let mut cur = root;
    loop {
        let cur_size = unsafe { nav::size_of_block(cur) };
        if size == cur_size {
            // Splice in as the new list head of this size.
            links::set_succ(base, bp, Some(cur));
            links::set_pred(base, cur, Some(bp));
            replace_node_in_tree(heap, cur, bp);
            return;
        } else if size < cur_size {
            match links::left(cur) {
                Some(l) => cur = l,
                None => {
                    links::set_left(cur, Some(bp));
                    links::set_parent(bp, Some(cur));
                    return;
                }
            }
        } else {
            match links::right(cur) {
                Some(r) => cur = r,
                None => {
                    links::set_right(cur, Some(bp));
                    links::set_parent(bp, Some(cur));
                    return;
                }
            }
        }
    }
}

/// Removes free block `bp` of size `size` from the tree.
pub fn remove<P: HeapProvider>(heap: &mut Heap<P>, bp: BlockPtr, _size: usize) {
    let base = heap.base();

    if let Some(p) = links::pred(base, bp) {
        // Not the list head: a plain doubly-linked splice, tree untouched.
        let s = links::succ(base, bp);
        links::set_succ(base, p, s);
        if let Some(s) = s {
            links::set_pred(base, s, Some(p));
        }
        return;
    }

    if let Some(succ) = links::succ(base, bp) {
        // Head of a multi-block chain: promote the next block to tree node.
        replace_node_in_tree(heap, bp, succ);
        links::set_pred(base, succ, None);
        return;
    }

    // Sole node of this size: standard BST deletion by in-order successor.
    let left = links::left(bp);
    let right = links::right(bp);

    match (left, right) {
        (None, None) => splice_into_parent(heap, bp, None),
        (Some(child), None) | (None, Some(child)) => splice_into_parent(heap, bp, Some(child)),
        (Some(left), Some(right)) => {
            let mut succ = right;
            let mut succ_parent = bp;
            while let Some(l) = links::left(succ) {
                succ_parent = succ;
                succ = l;
            }

            if succ_parent != bp {
                let succ_right = links::right(succ);
                links::set_left(succ_parent, succ_right);
                if let Some(sr) = succ_right {
                    links::set_parent(sr, Some(succ_parent));
                }
                links::set_right(succ, right);
                if let Some(r) = links::right(succ) {
                    links::set_parent(r, Some(succ));
                }
            }
            // else: succ is bp's immediate right child, so it already
            // owns bp's right subtree verbatim.

            links::set_left(succ, Some(left));
            links::set_parent(left, Some(succ));
            splice_into_parent(heap, bp, Some(succ));
        }
    }
}

/// Best-fit search: the smallest free block with size `>= size`, or
/// `None` if the tree holds nothing large enough. Ties resolve to the
/// tree node itself — the most recently inserted block of that size,
/// giving LIFO reuse within a size class (spec §4.4).
pub fn find_fit<P: HeapProvider>(heap: &Heap<P>, size: usize) -> Option<BlockPtr> {
    let mut cur = heap.tree_root();
    let mut best = None;
    while let Some(node) = cur {
        let node_size = unsafe { nav::size_of_block(node) };
        if size == node_size {
            return Some(node);
        } else if size < node_size {
            best = Some(node);
            cur = links::left(node);
        } else {
            cur = links::right(node);
        }
    }
    best
}

/// In-order traversal, used by the consistency checker to verify the BST
/// invariant (strictly increasing sizes, bidirectional parent/child
/// links) and to count indexed free blocks including same-size chains.
pub fn in_order<P: HeapProvider>(heap: &Heap<P>) -> Vec<BlockPtr> {
    let base = heap.base();
    let mut out = Vec::new();
    let mut stack = Vec::new();
    let mut cur = heap.tree_root();
    loop {
        while let Some(node) = cur {
            stack.push(node);
            cur = links::left(node);
        }
        let Some(node) = stack.pop() else { break };
        let mut chain = Some(node);
        while let Some(b) = chain {
            out.push(b);
            chain = links::succ(base, b);
        }
        cur = links::right(node);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HeapError;
    use crate::header;

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
        fn sbrk(&mut self, n: usize) -> Result<usize, HeapError> {
            let old = self.heap_high();
            self.used += n;
            assert!(self.used <= self.mem.len());
            Ok(old)
        }
    }

    fn fresh_heap(bytes: usize) -> Heap<FakeProvider> {
        let mut heap = Heap::new(FakeProvider::new(bytes));
        heap.initialize().unwrap();
        heap
    }

    fn make_free_block<P: HeapProvider>(heap: &Heap<P>, offset: usize, size: usize) -> BlockPtr {
        let bp = (heap.base() + offset) as BlockPtr;
        let word = header::pack(size, false, true, false);
        unsafe { nav::write_boundary_tags(bp, size, word, true) };
        bp
    }

    #[test]
    fn insert_and_find_exact_and_best_fit() {
        let mut heap = fresh_heap(8192);
        let a = make_free_block(&heap, 512, 512);
        let b = make_free_block(&heap, 1536, 1024);
        let c = make_free_block(&heap, 2816, 256);
        insert(&mut heap, a, 512);
        insert(&mut heap, b, 1024);
        insert(&mut heap, c, 256);

        assert_eq!(find_fit(&heap, 256), Some(c));
        assert_eq!(find_fit(&heap, 300), Some(a));
        assert_eq!(find_fit(&heap, 1024), Some(b));
        assert_eq!(find_fit(&heap, 2000), None);

        let order: Vec<usize> = in_order(&heap)
            .into_iter()
            .map(|b| unsafe { nav::size_of_block(b) })
            .collect();
        assert_eq!(order, vec![256, 512, 1024]);
    }

    #[test]
    fn same_size_chain_serves_most_recently_inserted_first() {
        let mut heap = fresh_heap(8192);
        let a = make_free_block(&heap, 512, 64);
        let b = make_free_block(&heap, 640, 64);
        insert(&mut heap, a, 64);
        insert(&mut heap, b, 64);

        // b was inserted last, so it becomes the tree node (LIFO head).
        assert_eq!(find_fit(&heap, 64), Some(b));
        assert_eq!(links::succ(heap.base(), b), Some(a));
    }

    #[test]
    fn remove_non_head_chain_member_leaves_tree_untouched() {
        let mut heap = fresh_heap(8192);
        let a = make_free_block(&heap, 512, 64);
        let b = make_free_block(&heap, 640, 64);
        insert(&mut heap, a, 64);
        insert(&mut heap, b, 64);

        remove(&mut heap, a, 64);
        assert_eq!(find_fit(&heap, 64), Some(b));
        assert_eq!(links::succ(heap.base(), b), None);
    }

    #[test]
    fn remove_head_promotes_successor_to_tree_node() {
        let mut heap = fresh_heap(8192);
        let a = make_free_block(&heap, 512, 64);
        let b = make_free_block(&heap, 640, 64);
        insert(&mut heap, a, 64);
        insert(&mut heap, b, 64); // b is head

        remove(&mut heap, b, 64);
        assert_eq!(find_fit(&heap, 64), Some(a));
        assert_eq!(links::pred(heap.base(), a), None);
    }

    #[test]
    fn remove_sole_node_with_two_children_uses_successor_deletion() {
        let mut heap = fresh_heap(8192);
        let root = make_free_block(&heap, 1536, 1024);
        let left = make_free_block(&heap, 512, 512);
        let right = make_free_block(&heap, 2816, 2048);
        insert(&mut heap, root, 1024);
        insert(&mut heap, left, 512);
        insert(&mut heap, right, 2048);

        remove(&mut heap, root, 1024);

        let order: Vec<usize> = in_order(&heap)
            .into_iter()
            .map(|b| unsafe { nav::size_of_block(b) })
            .collect();
        assert_eq!(order, vec![512, 2048]);
        assert_eq!(find_fit(&heap, 600), Some(right));
    }

    #[test]
    fn remove_sole_node_with_deep_successor_relinks_correctly() {
        let mut heap = fresh_heap(8192);
        let root = make_free_block(&heap, 0x1000, 1000);
        let left = make_free_block(&heap, 0x1200, 500);
        let right = make_free_block(&heap, 0x1400, 2000);
        let right_left = make_free_block(&heap, 0x1600, 1500);
        let right_left_left = make_free_block(&heap, 0x1800, 1200);
        insert(&mut heap, root, 1000);
        insert(&mut heap, left, 500);
        insert(&mut heap, right, 2000);
        insert(&mut heap, right_left, 1500);
        insert(&mut heap, right_left_left, 1200);

        remove(&mut heap, root, 1000);

        let order: Vec<usize> = in_order(&heap)
            .into_iter()
            .map(|b| unsafe { nav::size_of_block(b) })
            .collect();
        assert_eq!(order, vec![500, 1200, 1500, 2000]);
    }
}

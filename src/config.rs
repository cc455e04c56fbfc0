//! Allocator-wide tuning constants.
//!
//! Every other module imports these rather than hard-coding sizes, so the
//! threshold between size-class bins and the BST (and the bin count that
//! follows from it) is decided in exactly one place.

/// Minimum block size: a 4-byte header plus a 4-byte successor offset.
pub const MIN_BLOCK_SIZE: usize = 8;

/// Smallest free-block size that still has room for a predecessor offset
/// (`header + succ + pred`, rounded up to the 8-byte grid).
pub const SMALL_WITH_PRED: usize = 16;

/// Size above which a free block is large enough to hold a full tree node
/// (succ + pred + left + right + parent = 4+4+8+8+8 = 32 bytes of payload,
/// plus a 4-byte header and 4-byte footer). See DESIGN.md for the
/// derivation; this resolves the THRESHOLD open question in spec.md §9(a).
pub const THRESHOLD: usize = 40;

/// Number of size-class bins below [`THRESHOLD`], one per 8-byte size class:
/// {8, 16, 24, 32}.
pub const SIZE_CLASS_COUNT: usize = (THRESHOLD - MIN_BLOCK_SIZE) / 8;

/// Total bin count: one slot per size class, plus one slot holding the BST
/// root offset.
pub const BIN_COUNT: usize = SIZE_CLASS_COUNT + 1;

/// Index of the bin slot that holds the BST root offset.
pub const TREE_BIN_INDEX: usize = SIZE_CLASS_COUNT;

/// Bytes requested from the heap provider the first time the heap grows
/// beyond the bins array + prologue + epilogue, and the minimum chunk any
/// later `extend_heap` call asks for.
pub const CHUNK_SIZE: usize = 1 << 8;

/// Word size used throughout the boundary-tag codec (header/footer).
pub const WORD_SIZE: usize = 4;

/// Returns the size class bin index for a free block of size `size`, or
/// `None` if it belongs in the tree.
pub fn size_class_index(size: usize) -> Option<usize> {
    if size >= THRESHOLD {
        None
    } else {
        Some((size - MIN_BLOCK_SIZE) / 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_classes_cover_min_to_threshold() {
        assert_eq!(size_class_index(MIN_BLOCK_SIZE), Some(0));
        assert_eq!(size_class_index(THRESHOLD - 8), Some(SIZE_CLASS_COUNT - 1));
        assert_eq!(size_class_index(THRESHOLD), None);
        assert_eq!(size_class_index(THRESHOLD + 8), None);
    }

    #[test]
    fn bin_count_has_one_slot_per_class_plus_tree() {
        assert_eq!(BIN_COUNT, SIZE_CLASS_COUNT + 1);
        assert_eq!(TREE_BIN_INDEX, SIZE_CLASS_COUNT);
    }
}

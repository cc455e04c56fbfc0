//! # segfit — a segregated-list + size-keyed BST heap allocator
//!
//! This crate manages a single growable region obtained from the OS via
//! `sbrk(2)` and serves `allocate`/`release`/`resize`/`zeroed_allocate`
//! requests out of it, using the hybrid free-block index described below
//! instead of a flat free list.
//!
//! ## Free Index
//!
//! Free blocks are tracked in one of two places, chosen by size:
//!
//! - **Size-class bins** (below [`config::THRESHOLD`]): one doubly-linked
//!   list per 8-byte size class, giving O(1) insert, remove, and exact-fit
//!   lookup. The single minimum-size class has no room for a predecessor
//!   link and is singly linked instead.
//! - **A size-keyed BST** (at or above the threshold): ordered on block
//!   size, with same-size blocks chained off their tree node instead of
//!   duplicated as tree nodes, so best-fit lookup stays `O(log n)` even
//!   under many same-sized blocks.
//!
//! ## Layout
//!
//! ```text
//!   segfit
//!   ├── config      - tuning constants and size-class math
//!   ├── align       - 8-byte / power-of-two rounding
//!   ├── error       - HeapError (provider failures)
//!   ├── header      - boundary-tag bit packing
//!   ├── nav         - header/footer reads, next/prev block navigation
//!   ├── links       - free-block intra-links (same-size list + BST)
//!   ├── bins        - size-class bins
//!   ├── tree        - size-keyed BST of same-size lists
//!   ├── index       - Free Index: routes between bins and tree
//!   ├── coalesce    - boundary-tag coalescing
//!   ├── place       - split-on-allocate / in-place-grow
//!   ├── heap        - HeapProvider, SbrkHeap, Heap<P> (owns all state)
//!   ├── check       - consistency checker (CheckError)
//!   └── alloc       - public façade: Allocator<P>, SbrkAllocator
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use segfit::alloc::SbrkAllocator;
//!
//! let mut allocator = SbrkAllocator::default();
//! let p = allocator.allocate(64);
//! assert!(!p.is_null());
//! allocator.release(p);
//! ```

pub mod align;
pub mod alloc;
pub mod bins;
pub mod check;
pub mod coalesce;
pub mod config;
pub mod error;
pub mod header;
pub mod heap;
pub mod index;
pub mod links;
pub mod nav;
pub mod place;
pub mod tree;

pub use alloc::{Allocator, SbrkAllocator};
pub use check::CheckError;
pub use error::HeapError;
pub use heap::{Heap, HeapProvider, SbrkHeap};

//! Error types for the heap-provider boundary.
//!
//! Everything here stays below the public allocator façade (`alloc.rs`):
//! per spec, allocation failure is a null return, not a `Result` — these
//! types exist so the provider and the heap-growth path have something
//! better than a magic sentinel to propagate internally and to log.

use thiserror::Error;

/// Failure modes for the raw heap provider (`HeapProvider::sbrk`) and the
/// heap-growth path built on top of it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeapError {
    /// The underlying `sbrk` syscall returned its failure sentinel.
    #[error("sbrk failed to extend the heap by {requested} bytes")]
    BrkFailed { requested: usize },

    /// No raw heap provider is available on this platform.
    #[error("no sbrk-style heap provider is available on this platform")]
    Unsupported,
}

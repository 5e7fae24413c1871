//! bloom_oxide: concurrent probabilistic membership filters
//!
//! A bloom-filter family backed by a shared bit-level storage layer:
//! classic and partitioned bloom filters, stable bloom filters with bounded
//! steady-state false positives, cuckoo filters with deletion support, and a
//! scalable composite that grows as it fills. Bit storage lives on the heap,
//! in off-heap anonymous memory, or in a memory-mapped file, and all filters
//! support concurrent insertion and query through striped read-write locking.
//!
//! # Example
//! ```
//! use bloom_oxide::FilterBuilder;
//!
//! let filter = FilterBuilder::new(10_000, 0.01).build_classic().unwrap();
//! filter.put(b"key1");
//! assert!(filter.might_contain(b"key1"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod common;
pub mod filters;
pub mod storage;
pub mod sync;

// Re-export core types for convenience
pub use common::{hash, Filter, FilterError, HashKind, MergeableFilter, Result};
pub use filters::{
    ClassicFilter, CuckooFilter, FilterBuilder, FilterVariant, PartitionedFilter, ScalableFilter,
    StableFilter,
};
pub use storage::{BackingKind, BitVector, BucketSet};

/// Error types and result aliases for filter operations
pub mod error {
    pub use crate::common::{FilterError, Result};
}

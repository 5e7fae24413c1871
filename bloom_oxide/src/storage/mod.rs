//! Bit-level storage: raw bit vectors and the bucketed tag view

mod bit_vector;
mod bucket_set;

pub use bit_vector::{BackingKind, BitVector};
pub use bucket_set::BucketSet;

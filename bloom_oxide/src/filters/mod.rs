//! Filter variants and their builder
//!
//! Four membership algorithms over the storage layer plus a scalable
//! composite: classic bloom ([`ClassicFilter`]), partitioned bloom
//! ([`PartitionedFilter`]), stable bloom ([`StableFilter`]), cuckoo
//! ([`CuckooFilter`]), and [`ScalableFilter`]. All are constructed through
//! [`FilterBuilder`].

mod builder;
mod classic;
mod cuckoo;
mod partitioned;
mod scalable;
mod stable;

pub use builder::{optimal_num_of_bits, optimal_num_of_hashes, FilterBuilder, FilterVariant};
pub use classic::ClassicFilter;
pub use cuckoo::CuckooFilter;
pub use partitioned::PartitionedFilter;
pub use scalable::ScalableFilter;
pub use stable::StableFilter;

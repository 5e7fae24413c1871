//! Partitioned bloom filter
//!
//! The vector is split into `k` equal slices and every insertion writes
//! exactly one bit per slice, so the per-slice fill ratio estimates overall
//! saturation. Used standalone and as the member type of
//! [`ScalableFilter`](crate::filters::ScalableFilter).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::common::hash::{self, HashKind};
use crate::common::{Filter, FilterError, MergeableFilter, Result};
use crate::filters::builder::{optimal_num_of_bits, optimal_num_of_hashes};
use crate::storage::{BackingKind, BitVector};
use crate::sync::StripedLock;

/// Bloom filter over `k` equal slices, one bit per slice per item
pub struct PartitionedFilter {
    vector: BitVector,
    num_hashes: u32,
    slice_size: u64,
    num_items: AtomicU64,
    hash: HashKind,
    locks: StripedLock,
}

impl PartitionedFilter {
    pub(crate) fn from_parts(
        vector: BitVector,
        num_hashes: u32,
        slice_size: u64,
        hash: HashKind,
    ) -> Self {
        debug_assert_eq!(vector.bit_size(), num_hashes as u64 * slice_size);
        PartitionedFilter {
            vector,
            num_hashes,
            slice_size,
            num_items: AtomicU64::new(0),
            hash,
            locks: StripedLock::new(),
        }
    }

    /// Sizes and allocates a filter for `expected_items` at `fpp` on the
    /// given backing
    ///
    /// The bit count is aligned up to a multiple of the hash count so slices
    /// divide evenly.
    ///
    /// # Errors
    /// Propagates off-heap allocation failures; file-mapped backings need a
    /// path and are only reachable through the builder.
    pub(crate) fn with_capacity(
        expected_items: u64,
        fpp: f64,
        hash: HashKind,
        backing: BackingKind,
    ) -> Result<Self> {
        let bits = optimal_num_of_bits(expected_items, fpp);
        let num_hashes = optimal_num_of_hashes(expected_items, bits);
        let aligned = bits.div_ceil(num_hashes as u64) * num_hashes as u64;
        let vector = match backing {
            BackingKind::Heap => BitVector::new_heap(aligned),
            BackingKind::OffHeap => BitVector::new_off_heap(aligned)?,
            BackingKind::FileMapped => {
                return Err(FilterError::invalid_parameter(
                    "backing",
                    "file-mapped",
                    "requires a path; use the builder",
                ))
            }
        };
        Ok(Self::from_parts(
            vector,
            num_hashes,
            aligned / num_hashes as u64,
            hash,
        ))
    }

    /// Inserts an item, writing one bit in each of the `k` slices
    ///
    /// Returns `true` iff at least one bit transitioned; only then does the
    /// item counter advance.
    pub fn put(&self, item: &[u8]) -> bool {
        let mut changed = false;
        for (slice, probe) in hash::index_hashes(self.hash, item, self.num_hashes as usize)
            .into_iter()
            .enumerate()
        {
            let index = slice as u64 * self.slice_size + probe % self.slice_size;
            let _guard = self.locks.write(index);
            changed |= self.vector.set(index);
        }
        if changed {
            self.num_items.fetch_add(1, Ordering::Relaxed);
        }
        changed
    }

    /// Queries membership, short-circuiting on the first unset bit
    pub fn might_contain(&self, item: &[u8]) -> bool {
        for (slice, probe) in hash::index_hashes(self.hash, item, self.num_hashes as usize)
            .into_iter()
            .enumerate()
        {
            let index = slice as u64 * self.slice_size + probe % self.slice_size;
            let _guard = self.locks.read(index);
            if !self.vector.get(index) {
                return false;
            }
        }
        true
    }

    /// Estimated fraction of the filter consumed: `1 - e^(-n/m)` over the
    /// per-slice count
    pub fn estimated_fill_ratio(&self) -> f64 {
        let items = self.num_items.load(Ordering::Relaxed) as f64;
        1.0 - (-(items / self.slice_size as f64)).exp()
    }

    /// Expected false-positive probability at the current fill
    pub fn expected_fpp(&self) -> f64 {
        let fill = self.vector.cardinality() as f64 / self.vector.bit_size() as f64;
        fill.powi(self.num_hashes as i32)
    }

    /// Items accepted so far (transitions only)
    pub fn num_items(&self) -> u64 {
        self.num_items.load(Ordering::Relaxed)
    }

    /// Number of hash functions (and slices)
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Bits per slice
    pub fn slice_size(&self) -> u64 {
        self.slice_size
    }

    /// Size of the bit vector
    pub fn bit_size(&self) -> u64 {
        self.vector.bit_size()
    }

    /// Number of set bits
    pub fn cardinality(&self) -> u64 {
        self.vector.cardinality()
    }
}

impl Filter for PartitionedFilter {
    fn put(&self, item: &[u8]) -> bool {
        PartitionedFilter::put(self, item)
    }

    fn might_contain(&self, item: &[u8]) -> bool {
        PartitionedFilter::might_contain(self, item)
    }

    fn remove(&self, _item: &[u8]) -> Result<bool> {
        Err(FilterError::Unsupported {
            operation: "remove",
            variant: "PartitionedFilter",
        })
    }

    fn clear(&self) {
        let _guards = self.locks.write_all();
        self.vector.clear();
        self.num_items.store(0, Ordering::Relaxed);
    }

    fn expected_fpp(&self) -> f64 {
        PartitionedFilter::expected_fpp(self)
    }

    fn close(&mut self) {
        self.vector.close();
    }
}

impl MergeableFilter for PartitionedFilter {
    fn merge_in_place(&self, other: &Self) -> Result<()> {
        if self.num_hashes != other.num_hashes {
            return Err(FilterError::incompatible(format!(
                "hash count mismatch: {} vs {}",
                self.num_hashes, other.num_hashes
            )));
        }
        let _guards = self.locks.write_all();
        self.vector.put_all(&other.vector)?;
        // Counts are approximations; the union can only hold more items
        self.num_items
            .fetch_add(other.num_items.load(Ordering::Relaxed), Ordering::Relaxed);
        Ok(())
    }
}

impl fmt::Debug for PartitionedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionedFilter")
            .field("bit_size", &self.vector.bit_size())
            .field("num_hashes", &self.num_hashes)
            .field("slice_size", &self.slice_size)
            .field("num_items", &self.num_items())
            .field("fill_ratio", &self.estimated_fill_ratio())
            .finish()
    }
}

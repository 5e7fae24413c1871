//! Stable bloom filter
//!
//! Buckets hold small saturating counters instead of single bits. Every
//! insertion first decrements `P` cells walked from a random pivot, then
//! writes the item's `k` target buckets to the counter maximum. Old items
//! decay, which bounds the steady-state false-positive rate on unbounded
//! streams at the cost of false negatives.

use std::fmt;

use rand::Rng;

use crate::common::hash::{self, HashKind};
use crate::common::{Filter, FilterError, MergeableFilter, Result};
use crate::storage::BucketSet;
use crate::sync::StripedLock;

/// Stable bloom filter with d-bit counter buckets and random decay
pub struct StableFilter {
    buckets: BucketSet,
    num_hashes: u32,
    num_buckets: u64,
    max_value: u64,
    decrements: u64,
    hash: HashKind,
    locks: StripedLock,
}

impl StableFilter {
    pub(crate) fn from_parts(
        buckets: BucketSet,
        num_hashes: u32,
        decrements: u64,
        hash: HashKind,
    ) -> Self {
        let num_buckets = buckets.num_buckets();
        let max_value = (1u64 << buckets.bits_per_tag()) - 1;
        StableFilter {
            buckets,
            num_hashes,
            num_buckets,
            max_value,
            decrements,
            hash,
            locks: StripedLock::new(),
        }
    }

    /// Inserts an item
    ///
    /// Decrements `P` cells starting at a uniformly random pivot (adjacent
    /// cells by design; each cell is touched with probability `P/m` per
    /// insertion), then saturates the `k` target buckets. Returns `true` iff
    /// any target bucket was below the maximum.
    pub fn put(&self, item: &[u8]) -> bool {
        let pivot = rand::rng().random_range(0..self.num_buckets);
        for offset in 0..self.decrements {
            let bucket = (pivot + offset) % self.num_buckets;
            let _guard = self.locks.write(bucket);
            let value = self.buckets.read_tag(bucket, 0);
            if value > 0 {
                self.buckets.write_tag(bucket, 0, value - 1);
            }
        }

        let mut changed = false;
        for probe in hash::index_hashes(self.hash, item, self.num_hashes as usize) {
            let bucket = probe % self.num_buckets;
            let _guard = self.locks.write(bucket);
            if self.buckets.read_tag(bucket, 0) != self.max_value {
                changed = true;
                self.buckets.write_tag(bucket, 0, self.max_value);
            }
        }
        changed
    }

    /// Queries membership: all `k` target buckets must be nonzero
    ///
    /// Stale items decay to zero, so a `false` here may be a false negative;
    /// that is the variant's design trade.
    pub fn might_contain(&self, item: &[u8]) -> bool {
        for probe in hash::index_hashes(self.hash, item, self.num_hashes as usize) {
            let bucket = probe % self.num_buckets;
            let _guard = self.locks.read(bucket);
            if self.buckets.read_tag(bucket, 0) == 0 {
                return false;
            }
        }
        true
    }

    /// Steady-state false-positive probability `(1 - stable_point)^k`
    pub fn expected_fpp(&self) -> f64 {
        (1.0 - self.stable_point()).powi(self.num_hashes as i32)
    }

    /// Asymptotic fraction of zero-valued cells
    pub fn stable_point(&self) -> f64 {
        let k = self.num_hashes as f64;
        let m = self.num_buckets as f64;
        let p = self.decrements as f64;
        let base = 1.0 / (1.0 + 1.0 / (p * (1.0 / k - 1.0 / m)));
        base.powf(self.max_value as f64)
    }

    /// Cells decremented per insertion
    pub fn decrement_count(&self) -> u64 {
        self.decrements
    }

    /// Number of counter buckets
    pub fn num_buckets(&self) -> u64 {
        self.num_buckets
    }

    /// Number of hash functions
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Counter width in bits
    pub fn bits_per_bucket(&self) -> u32 {
        self.buckets.bits_per_tag()
    }

    /// Saturation value of a bucket
    pub fn max_value(&self) -> u64 {
        self.max_value
    }
}

impl Filter for StableFilter {
    fn put(&self, item: &[u8]) -> bool {
        StableFilter::put(self, item)
    }

    fn might_contain(&self, item: &[u8]) -> bool {
        StableFilter::might_contain(self, item)
    }

    fn remove(&self, _item: &[u8]) -> Result<bool> {
        Err(FilterError::Unsupported {
            operation: "remove",
            variant: "StableFilter",
        })
    }

    fn clear(&self) {
        let _guards = self.locks.write_all();
        self.buckets.clear();
    }

    fn expected_fpp(&self) -> f64 {
        StableFilter::expected_fpp(self)
    }

    fn close(&mut self) {
        self.buckets.close();
    }
}

impl MergeableFilter for StableFilter {
    fn merge_in_place(&self, other: &Self) -> Result<()> {
        if self.num_hashes != other.num_hashes {
            return Err(FilterError::incompatible(format!(
                "hash count mismatch: {} vs {}",
                self.num_hashes, other.num_hashes
            )));
        }
        let _guards = self.locks.write_all();
        self.buckets.put_all(&other.buckets)
    }
}

impl fmt::Debug for StableFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StableFilter")
            .field("num_buckets", &self.num_buckets)
            .field("num_hashes", &self.num_hashes)
            .field("bits_per_bucket", &self.bits_per_bucket())
            .field("decrements", &self.decrements)
            .field("expected_fpp", &self.expected_fpp())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BitVector;

    fn small_filter(bits_per_bucket: u32, num_buckets: u64, decrements: u64) -> StableFilter {
        let vector = BitVector::new_heap(bits_per_bucket as u64 * num_buckets);
        let buckets = BucketSet::new(vector, bits_per_bucket, 1, num_buckets);
        StableFilter::from_parts(buckets, 3, decrements, HashKind::Murmur128)
    }

    #[test]
    fn test_fresh_insert_saturates_targets() {
        let filter = small_filter(8, 1024, 2);
        assert!(filter.put(b"item"));
        assert!(filter.might_contain(b"item"));

        // All target buckets sit at the counter maximum
        let saturated = (0..1024u64)
            .filter(|&b| filter.buckets.read_tag(b, 0) == filter.max_value())
            .count();
        assert!(saturated >= 1 && saturated <= 3, "saturated {}", saturated);
    }

    #[test]
    fn test_decrement_budget_respected() {
        let filter = small_filter(4, 256, 8);
        // Saturate a spread of buckets, then insert once and count how many
        // cells dropped below max
        for bucket in 0..256u64 {
            filter.buckets.write_tag(bucket, 0, filter.max_value());
        }
        filter.put(b"new item");
        let below: u64 = (0..256u64)
            .filter(|&b| filter.buckets.read_tag(b, 0) < filter.max_value())
            .count() as u64;
        // At most P cells decrement (targets of the insert are re-saturated)
        assert!(below <= 8, "decremented {}", below);
    }

    #[test]
    fn test_empty_filter_misses() {
        let filter = small_filter(8, 512, 4);
        assert!(!filter.might_contain(b"missing"));
    }

    #[test]
    fn test_does_not_saturate_under_stream() {
        let filter = small_filter(2, 128, 16);
        for i in 0..5_000u64 {
            filter.put(&i.to_le_bytes());
        }
        let nonzero = (0..128u64)
            .filter(|&b| filter.buckets.read_tag(b, 0) > 0)
            .count();
        assert!(nonzero < 128, "filter saturated: {} nonzero", nonzero);
        assert!(nonzero > 0);
    }

    #[test]
    fn test_remove_unsupported() {
        let filter = small_filter(8, 128, 1);
        assert!(matches!(
            Filter::remove(&filter, b"x"),
            Err(FilterError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_stable_point_in_unit_interval() {
        let filter = small_filter(8, 4096, 128);
        let sp = filter.stable_point();
        assert!(sp > 0.0 && sp < 1.0, "stable point {}", sp);
        let fpp = filter.expected_fpp();
        assert!(fpp > 0.0 && fpp < 1.0, "fpp {}", fpp);
    }
}

//! Classic bloom filter
//!
//! Each inserted item sets `k` bits of a single vector; a query reports
//! membership when all `k` bits are set. No false negatives, no removal.

use std::fmt;

use crate::common::hash::{self, HashKind};
use crate::common::{Filter, FilterError, MergeableFilter, Result};
use crate::storage::BitVector;
use crate::sync::StripedLock;

/// Classic k-bit bloom filter over one bit vector
pub struct ClassicFilter {
    vector: BitVector,
    num_hashes: u32,
    hash: HashKind,
    locks: StripedLock,
}

impl ClassicFilter {
    pub(crate) fn from_parts(vector: BitVector, num_hashes: u32, hash: HashKind) -> Self {
        ClassicFilter {
            vector,
            num_hashes,
            hash,
            locks: StripedLock::new(),
        }
    }

    /// Inserts an item; returns `true` iff any bit transitioned
    pub fn put(&self, item: &[u8]) -> bool {
        let size = self.vector.bit_size();
        let mut changed = false;
        for probe in hash::index_hashes(self.hash, item, self.num_hashes as usize) {
            let index = probe % size;
            let _guard = self.locks.write(index);
            changed |= self.vector.set(index);
        }
        changed
    }

    /// Queries membership, short-circuiting on the first unset bit
    pub fn might_contain(&self, item: &[u8]) -> bool {
        let size = self.vector.bit_size();
        for probe in hash::index_hashes(self.hash, item, self.num_hashes as usize) {
            let index = probe % size;
            let _guard = self.locks.read(index);
            if !self.vector.get(index) {
                return false;
            }
        }
        true
    }

    /// Expected false-positive probability at the current fill:
    /// `(cardinality / bit_size)^k`
    pub fn expected_fpp(&self) -> f64 {
        let fill = self.vector.cardinality() as f64 / self.vector.bit_size() as f64;
        fill.powi(self.num_hashes as i32)
    }

    /// Number of hash functions
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Size of the bit vector
    pub fn bit_size(&self) -> u64 {
        self.vector.bit_size()
    }

    /// Number of set bits
    pub fn cardinality(&self) -> u64 {
        self.vector.cardinality()
    }

    /// Bytes held by the bit vector
    pub fn memory_usage(&self) -> usize {
        self.vector.memory_usage()
    }
}

impl Filter for ClassicFilter {
    fn put(&self, item: &[u8]) -> bool {
        ClassicFilter::put(self, item)
    }

    fn might_contain(&self, item: &[u8]) -> bool {
        ClassicFilter::might_contain(self, item)
    }

    fn remove(&self, _item: &[u8]) -> Result<bool> {
        Err(FilterError::Unsupported {
            operation: "remove",
            variant: "ClassicFilter",
        })
    }

    fn clear(&self) {
        let _guards = self.locks.write_all();
        self.vector.clear();
    }

    fn expected_fpp(&self) -> f64 {
        ClassicFilter::expected_fpp(self)
    }

    fn close(&mut self) {
        self.vector.close();
    }
}

impl MergeableFilter for ClassicFilter {
    fn merge_in_place(&self, other: &Self) -> Result<()> {
        if self.num_hashes != other.num_hashes {
            return Err(FilterError::incompatible(format!(
                "hash count mismatch: {} vs {}",
                self.num_hashes, other.num_hashes
            )));
        }
        let _guards = self.locks.write_all();
        self.vector.put_all(&other.vector)
    }
}

impl fmt::Debug for ClassicFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassicFilter")
            .field("bit_size", &self.vector.bit_size())
            .field("num_hashes", &self.num_hashes)
            .field("cardinality", &self.vector.cardinality())
            .field("expected_fpp", &self.expected_fpp())
            .finish()
    }
}

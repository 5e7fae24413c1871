//! Cuckoo filter
//!
//! Stores a short fingerprint of each item in one of two candidate buckets.
//! A full pair triggers cuckoo eviction: a random victim is displaced to its
//! own alternate bucket, chaining until a slot frees up or the kick budget
//! runs out. Supports removal, which bloom variants cannot.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;
use tracing::warn;

use crate::common::hash::{self, HashKind};
use crate::common::{Filter, FilterError, Result};
use crate::storage::BucketSet;
use crate::sync::StripedLock;

/// Eviction chain budget before a put reports the filter full
const MAX_KICKS: usize = 500;

/// Multiplier spreading tags across the alternate-index space
/// (MurmurHash2 constant)
const ALT_MULTIPLIER: u64 = 0x5bd1_e995;

/// Two-choice fingerprint filter with eviction and removal
pub struct CuckooFilter {
    buckets: BucketSet,
    num_buckets: u64,
    bits_per_tag: u32,
    tags_per_bucket: u32,
    count: AtomicU64,
    hash: HashKind,
    locks: StripedLock,
}

impl CuckooFilter {
    pub(crate) fn from_parts(buckets: BucketSet, hash: HashKind) -> Self {
        let num_buckets = buckets.num_buckets();
        debug_assert!(num_buckets % 2 == 0, "bucket count must be even");
        CuckooFilter {
            num_buckets,
            bits_per_tag: buckets.bits_per_tag(),
            tags_per_bucket: buckets.tags_per_bucket(),
            buckets,
            count: AtomicU64::new(0),
            hash,
            locks: StripedLock::new(),
        }
    }

    fn index_and_tag(&self, item: &[u8]) -> (u64, u64) {
        let probes = hash::index_hashes(self.hash, item, 2);
        let bucket = probes[0] % self.num_buckets;
        let tag = hash::fingerprint(probes[1], self.bits_per_tag);
        (bucket, tag)
    }

    /// Alternate bucket for `(bucket, tag)`
    ///
    /// Adds `odd(tag * ALT_MULTIPLIER)` with a parity-dependent sign, modulo
    /// the (even) bucket count. The offset is odd and the modulus even, so
    /// the parity always flips and the mapping is its own inverse:
    /// `alt_index(alt_index(b, t), t) == b`.
    fn alt_index(&self, bucket: u64, tag: u64) -> u64 {
        let offset = (tag.wrapping_mul(ALT_MULTIPLIER) | 1) % self.num_buckets;
        if bucket % 2 == 0 {
            (bucket + offset) % self.num_buckets
        } else {
            (bucket + self.num_buckets - offset) % self.num_buckets
        }
    }

    /// Inserts an item
    ///
    /// Returns `false` when the eviction chain exhausts its budget; the
    /// filter is then effectively full for this bucket pair. The failure is
    /// logged, not raised, and the count only advances on success.
    pub fn put(&self, item: &[u8]) -> bool {
        let (bucket, tag) = self.index_and_tag(item);
        {
            let _guard = self.locks.write(bucket);
            if self.buckets.append(bucket, tag) {
                self.count.fetch_add(1, Ordering::Relaxed);
                return true;
            }
        }

        let mut current = self.alt_index(bucket, tag);
        let mut held = tag;
        let mut rng = rand::rng();
        for _ in 0..MAX_KICKS {
            {
                let _guard = self.locks.write(current);
                if self.buckets.append(current, held) {
                    self.count.fetch_add(1, Ordering::Relaxed);
                    return true;
                }
                let victim = rng.random_range(0..self.tags_per_bucket);
                let evicted = self.buckets.read_tag(current, victim);
                self.buckets.write_tag(current, victim, held);
                held = evicted;
            }
            current = self.alt_index(current, held);
        }

        warn!(
            kicks = MAX_KICKS,
            buckets = self.num_buckets,
            "cuckoo eviction chain exhausted, filter is full"
        );
        false
    }

    /// Queries membership in the primary, then the alternate bucket
    pub fn might_contain(&self, item: &[u8]) -> bool {
        let (bucket, tag) = self.index_and_tag(item);
        {
            let _guard = self.locks.read(bucket);
            if self.buckets.check_tag(bucket, tag).is_some() {
                return true;
            }
        }
        let alt = self.alt_index(bucket, tag);
        let _guard = self.locks.read(alt);
        self.buckets.check_tag(alt, tag).is_some()
    }

    /// Removes one copy of an item's fingerprint
    ///
    /// Returns `true` when a matching tag was cleared. Removing an item whose
    /// fingerprint was inserted twice can leave a false negative; the design
    /// accepts this.
    pub fn remove(&self, item: &[u8]) -> bool {
        let (bucket, tag) = self.index_and_tag(item);
        for candidate in [bucket, self.alt_index(bucket, tag)] {
            let _guard = self.locks.write(candidate);
            if let Some(pos) = self.buckets.check_tag(candidate, tag) {
                self.buckets.delete_tag(candidate, pos);
                let _ = self
                    .count
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
                        Some(count.saturating_sub(1))
                    });
                return true;
            }
        }
        false
    }

    /// Merging is not supported: evicted tags have no stable slot identity
    /// across two tables, so a bitwise union is meaningless
    ///
    /// # Errors
    /// Always [`FilterError::Unsupported`].
    pub fn merge_in_place(&self, _other: &Self) -> Result<()> {
        Err(FilterError::Unsupported {
            operation: "merge",
            variant: "CuckooFilter",
        })
    }

    /// Expected false-positive probability at the current load:
    /// `1 - ((2^t - 2)/(2^t - 1))^(2 b load)`
    pub fn expected_fpp(&self) -> f64 {
        let slots = (self.num_buckets * self.tags_per_bucket as u64) as f64;
        let load = self.count.load(Ordering::Relaxed) as f64 / slots;
        let space = 2f64.powi(self.bits_per_tag as i32);
        let survive = (space - 2.0) / (space - 1.0);
        1.0 - survive.powf(2.0 * self.tags_per_bucket as f64 * load)
    }

    /// Stored tags (approximate under concurrent mutation)
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Whether no tags are stored
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Total slot capacity
    pub fn capacity(&self) -> u64 {
        self.num_buckets * self.tags_per_bucket as u64
    }

    /// Fingerprint width in bits
    pub fn bits_per_tag(&self) -> u32 {
        self.bits_per_tag
    }

    /// Slots per bucket
    pub fn tags_per_bucket(&self) -> u32 {
        self.tags_per_bucket
    }

    /// Bucket count
    pub fn num_buckets(&self) -> u64 {
        self.num_buckets
    }
}

impl Filter for CuckooFilter {
    fn put(&self, item: &[u8]) -> bool {
        CuckooFilter::put(self, item)
    }

    fn might_contain(&self, item: &[u8]) -> bool {
        CuckooFilter::might_contain(self, item)
    }

    fn remove(&self, item: &[u8]) -> Result<bool> {
        Ok(CuckooFilter::remove(self, item))
    }

    fn clear(&self) {
        let _guards = self.locks.write_all();
        self.buckets.clear();
        self.count.store(0, Ordering::Relaxed);
    }

    fn expected_fpp(&self) -> f64 {
        CuckooFilter::expected_fpp(self)
    }

    fn close(&mut self) {
        self.buckets.close();
    }
}

impl fmt::Debug for CuckooFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CuckooFilter")
            .field("num_buckets", &self.num_buckets)
            .field("bits_per_tag", &self.bits_per_tag)
            .field("tags_per_bucket", &self.tags_per_bucket)
            .field("count", &self.count())
            .field("expected_fpp", &self.expected_fpp())
            .finish()
    }
}

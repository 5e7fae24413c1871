//! Bucketed tag view over a [`BitVector`]
//!
//! Packs fixed-width tags into fixed-capacity buckets: bucket `b`, position
//! `p` occupies the `bits_per_tag` bits starting at
//! `(b * tags_per_bucket + p) * bits_per_tag`. Within a slot the layout is
//! big-endian: tag bit 0 sits at the highest bit index of the slot.
//!
//! Tag value 0 is reserved as the "empty slot" sentinel; writers must derive
//! tags that are never zero (see
//! [`fingerprint`](crate::common::hash::fingerprint)).

use std::fmt;

use crate::common::Result;
use crate::storage::BitVector;

/// A logical view over a [`BitVector`] holding `num_buckets` buckets of
/// `tags_per_bucket` slots, each `bits_per_tag` bits wide
pub struct BucketSet {
    vector: BitVector,
    bits_per_tag: u32,
    tags_per_bucket: u32,
    num_buckets: u64,
}

impl BucketSet {
    /// Wraps `vector` as a bucket set
    ///
    /// # Panics
    /// Panics if `bits_per_tag` is outside `[1, 63]`, `tags_per_bucket` is 0,
    /// or the vector holds fewer than
    /// `bits_per_tag * tags_per_bucket * num_buckets` bits.
    pub fn new(vector: BitVector, bits_per_tag: u32, tags_per_bucket: u32, num_buckets: u64) -> Self {
        assert!(
            (1..=63).contains(&bits_per_tag),
            "bits per tag must be in [1, 63]"
        );
        assert!(tags_per_bucket > 0, "tags per bucket must be > 0");
        let required = bits_per_tag as u64 * tags_per_bucket as u64 * num_buckets;
        assert!(
            vector.bit_size() >= required,
            "vector of {} bits cannot hold {} buckets of {}x{} bits",
            vector.bit_size(),
            num_buckets,
            tags_per_bucket,
            bits_per_tag
        );
        BucketSet {
            vector,
            bits_per_tag,
            tags_per_bucket,
            num_buckets,
        }
    }

    #[inline]
    fn slot_base(&self, bucket: u64, pos: u32) -> u64 {
        assert!(bucket < self.num_buckets, "bucket {} out of range", bucket);
        assert!(pos < self.tags_per_bucket, "position {} out of range", pos);
        (bucket * self.tags_per_bucket as u64 + pos as u64) * self.bits_per_tag as u64
    }

    /// Reads the tag at `(bucket, pos)`
    pub fn read_tag(&self, bucket: u64, pos: u32) -> u64 {
        let base = self.slot_base(bucket, pos);
        let mut tag = 0u64;
        for offset in 0..self.bits_per_tag as u64 {
            tag = (tag << 1) | self.vector.get(base + offset) as u64;
        }
        tag
    }

    /// Overwrites the slot at `(bucket, pos)` with `tag`, setting or clearing
    /// each bit
    ///
    /// # Panics
    /// Panics if `tag` does not fit in `bits_per_tag` bits.
    pub fn write_tag(&self, bucket: u64, pos: u32, tag: u64) {
        assert!(
            tag >> self.bits_per_tag == 0,
            "tag {:#x} wider than {} bits",
            tag,
            self.bits_per_tag
        );
        let base = self.slot_base(bucket, pos);
        for offset in 0..self.bits_per_tag {
            let bit = (tag >> (self.bits_per_tag - 1 - offset)) & 1;
            if bit == 1 {
                self.vector.set(base + offset as u64);
            } else {
                self.vector.unset(base + offset as u64);
            }
        }
    }

    /// Empties the slot at `(bucket, pos)`
    pub fn delete_tag(&self, bucket: u64, pos: u32) {
        self.write_tag(bucket, pos, 0);
    }

    /// Scans `bucket` for `tag`, returning the first holding position
    pub fn check_tag(&self, bucket: u64, tag: u64) -> Option<u32> {
        (0..self.tags_per_bucket).find(|&pos| self.read_tag(bucket, pos) == tag)
    }

    /// First empty position in `bucket`
    pub fn free_pos_in_bucket(&self, bucket: u64) -> Option<u32> {
        self.check_tag(bucket, 0)
    }

    /// Stores `tag` in `bucket`
    ///
    /// Idempotent: returns `true` without writing when the tag is already
    /// present. Returns `false` when the bucket has no free slot.
    pub fn append(&self, bucket: u64, tag: u64) -> bool {
        if self.check_tag(bucket, tag).is_some() {
            return true;
        }
        match self.free_pos_in_bucket(bucket) {
            Some(pos) => {
                self.write_tag(bucket, pos, tag);
                true
            }
            None => false,
        }
    }

    /// In-place OR of `other`'s storage into this one
    ///
    /// # Errors
    /// Propagates [`BitVector::put_all`] incompatibility.
    pub fn put_all(&self, other: &BucketSet) -> Result<()> {
        self.vector.put_all(&other.vector)
    }

    /// Zeroes every bucket
    pub fn clear(&self) {
        self.vector.clear();
    }

    /// Releases the underlying vector
    pub fn close(&mut self) {
        self.vector.close();
    }

    /// Tag width in bits
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

    /// The backing vector
    pub fn vector(&self) -> &BitVector {
        &self.vector
    }
}

impl fmt::Debug for BucketSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketSet")
            .field("bits_per_tag", &self.bits_per_tag)
            .field("tags_per_bucket", &self.tags_per_bucket)
            .field("num_buckets", &self.num_buckets)
            .field("vector", &self.vector)
            .finish()
    }
}

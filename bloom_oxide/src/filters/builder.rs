//! Filter construction and sizing
//!
//! One builder feeds all five variants: it carries the target false-positive
//! rate, the expected item count, the storage choice (heap, off-heap, or a
//! mapped file), the hash mode, and the variant-specific knobs. Sizing
//! follows the standard bloom formulas; cuckoo sizing derives bucket shape
//! and tag width from the false-positive target.

use std::path::{Path, PathBuf};

use crate::common::hash::HashKind;
use crate::common::validation::{
    validate_bits_per_bucket, validate_bits_per_tag, validate_capacity, validate_cuckoo_fpp,
    validate_probability,
};
use crate::common::{Filter, FilterError, Result};
use crate::filters::{
    ClassicFilter, CuckooFilter, PartitionedFilter, ScalableFilter, StableFilter,
};
use crate::storage::{BackingKind, BitVector, BucketSet};

/// Default counter width for stable filters
const DEFAULT_BITS_PER_BUCKET: u32 = 3;

/// Default fill threshold and fpp tightening ratio for scalable filters.
/// A partitioned bloom filter at design capacity is about half full, so
/// growth triggers right at the capacity hint.
const DEFAULT_GROWTH_RATIO: f64 = 0.5;

/// Filter variant selector for [`FilterBuilder::build`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVariant {
    /// k bits in one vector
    Classic,
    /// k equal slices, one bit per slice
    Partitioned,
    /// counter buckets with random decay
    Stable,
    /// two-choice tag storage with eviction
    Cuckoo,
    /// growing cascade of partitioned filters
    Scalable,
}

/// Optimal bit count for `expected_items` at `fpp`:
/// `ceil(-n * ln(fpp) / ln(2)^2)`
pub fn optimal_num_of_bits(expected_items: u64, fpp: f64) -> u64 {
    let ln2_squared = std::f64::consts::LN_2.powi(2);
    (-(expected_items as f64) * fpp.ln() / ln2_squared).ceil() as u64
}

/// Optimal hash count for `expected_items` over `num_bits`:
/// `max(1, round((m/n) * ln 2))`
pub fn optimal_num_of_hashes(expected_items: u64, num_bits: u64) -> u32 {
    let k = (num_bits as f64 / expected_items as f64) * std::f64::consts::LN_2;
    (k.round() as u32).max(1)
}

/// Builder for every filter variant
///
/// # Example
/// ```
/// use bloom_oxide::{FilterBuilder, HashKind};
///
/// let filter = FilterBuilder::new(100_000, 0.001)
///     .hash_kind(HashKind::Murmur128)
///     .off_heap(true)
///     .build_cuckoo()
///     .unwrap();
/// assert!(filter.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct FilterBuilder {
    expected_items: u64,
    fpp: f64,
    hash: HashKind,
    off_heap: bool,
    path: Option<PathBuf>,
    bits_per_bucket: u32,
    growth_ratio: f64,
}

impl FilterBuilder {
    /// Starts a builder for `expected_items` at target false-positive rate
    /// `fpp`
    pub fn new(expected_items: u64, fpp: f64) -> Self {
        FilterBuilder {
            expected_items,
            fpp,
            hash: HashKind::default(),
            off_heap: false,
            path: None,
            bits_per_bucket: DEFAULT_BITS_PER_BUCKET,
            growth_ratio: DEFAULT_GROWTH_RATIO,
        }
    }

    /// Selects the base hash mode
    pub fn hash_kind(mut self, hash: HashKind) -> Self {
        self.hash = hash;
        self
    }

    /// Places the bit vector in off-heap anonymous memory
    pub fn off_heap(mut self, off_heap: bool) -> Self {
        self.off_heap = off_heap;
        self
    }

    /// Maps the bit vector over `path` (requires [`FilterBuilder::off_heap`])
    ///
    /// An existing file of the right length contributes its stored bits.
    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Counter width for the stable variant
    pub fn bits_per_bucket(mut self, bits: u32) -> Self {
        self.bits_per_bucket = bits;
        self
    }

    /// Fill threshold / tightening ratio for the scalable variant
    pub fn growth_ratio(mut self, ratio: f64) -> Self {
        self.growth_ratio = ratio;
        self
    }

    fn validate_common(&self) -> Result<()> {
        validate_capacity(self.expected_items)?;
        validate_probability(self.fpp, "fpp")
    }

    fn make_vector(&self, bits: u64) -> Result<BitVector> {
        match (&self.path, self.off_heap) {
            (Some(path), true) => BitVector::open_file(path, bits),
            (Some(path), false) => Err(FilterError::invalid_parameter(
                "path",
                path.display(),
                "file mapping requires off-heap storage",
            )),
            (None, true) => BitVector::new_off_heap(bits),
            (None, false) => Ok(BitVector::new_heap(bits)),
        }
    }

    /// Builds a classic bloom filter
    ///
    /// # Errors
    /// Invalid parameters or backing I/O failures.
    pub fn build_classic(&self) -> Result<ClassicFilter> {
        self.validate_common()?;
        let bits = optimal_num_of_bits(self.expected_items, self.fpp);
        let num_hashes = optimal_num_of_hashes(self.expected_items, bits);
        let vector = self.make_vector(bits)?;
        Ok(ClassicFilter::from_parts(vector, num_hashes, self.hash))
    }

    /// Builds a partitioned bloom filter
    ///
    /// # Errors
    /// Invalid parameters or backing I/O failures.
    pub fn build_partitioned(&self) -> Result<PartitionedFilter> {
        self.validate_common()?;
        let bits = optimal_num_of_bits(self.expected_items, self.fpp);
        let num_hashes = optimal_num_of_hashes(self.expected_items, bits);
        let aligned = bits.div_ceil(num_hashes as u64) * num_hashes as u64;
        let vector = self.make_vector(aligned)?;
        Ok(PartitionedFilter::from_parts(
            vector,
            num_hashes,
            aligned / num_hashes as u64,
            self.hash,
        ))
    }

    /// Builds a stable bloom filter
    ///
    /// # Errors
    /// Invalid parameters or backing I/O failures.
    pub fn build_stable(&self) -> Result<StableFilter> {
        self.validate_common()?;
        validate_bits_per_bucket(self.bits_per_bucket)?;
        let num_buckets = optimal_num_of_bits(self.expected_items, self.fpp);
        let num_hashes = optimal_num_of_hashes(self.expected_items, num_buckets);
        let decrements = stable_decrements(self.fpp, num_hashes, num_buckets, self.bits_per_bucket);
        let vector = self.make_vector(self.bits_per_bucket as u64 * num_buckets)?;
        let buckets = BucketSet::new(vector, self.bits_per_bucket, 1, num_buckets);
        Ok(StableFilter::from_parts(
            buckets, num_hashes, decrements, self.hash,
        ))
    }

    /// Builds a cuckoo filter
    ///
    /// # Errors
    /// Invalid parameters (including an fpp below the 2^-60 sizing floor) or
    /// backing I/O failures.
    pub fn build_cuckoo(&self) -> Result<CuckooFilter> {
        validate_capacity(self.expected_items)?;
        validate_cuckoo_fpp(self.fpp)?;

        let (tags_per_bucket, load_factor) = cuckoo_bucket_shape(self.fpp);
        let bits_per_tag = ((1.0 / self.fpp + 3.0).log2() / load_factor).ceil() as u32;
        validate_bits_per_tag(bits_per_tag)?;

        let slots_needed = (self.expected_items as f64 / load_factor).ceil() as u64;
        // Source-compatible biased ceiling, then round up to even so the
        // alternate-index involution holds
        let mut num_buckets = slots_needed / tags_per_bucket as u64 + 1;
        if num_buckets % 2 == 1 {
            num_buckets += 1;
        }

        let bits = bits_per_tag as u64 * tags_per_bucket as u64 * num_buckets;
        let vector = self.make_vector(bits)?;
        let buckets = BucketSet::new(vector, bits_per_tag, tags_per_bucket, num_buckets);
        Ok(CuckooFilter::from_parts(buckets, self.hash))
    }

    /// Builds a scalable bloom filter
    ///
    /// Members are allocated as the filter grows, so file mapping is not
    /// available for this variant.
    ///
    /// # Errors
    /// Invalid parameters or backing allocation failures.
    pub fn build_scalable(&self) -> Result<ScalableFilter> {
        self.validate_common()?;
        validate_probability(self.growth_ratio, "growth_ratio")?;
        if let Some(path) = &self.path {
            return Err(FilterError::invalid_parameter(
                "path",
                path.display(),
                "scalable filters allocate members at runtime and cannot be file-mapped",
            ));
        }
        let backing = if self.off_heap {
            BackingKind::OffHeap
        } else {
            BackingKind::Heap
        };
        let head =
            PartitionedFilter::with_capacity(self.expected_items, self.fpp, self.hash, backing)?;
        Ok(ScalableFilter::from_parts(
            head,
            self.expected_items,
            self.fpp,
            self.growth_ratio,
            self.hash,
            backing,
        ))
    }

    /// Builds the selected variant behind a trait object
    ///
    /// # Errors
    /// As the typed `build_*` methods.
    pub fn build(&self, variant: FilterVariant) -> Result<Box<dyn Filter>> {
        Ok(match variant {
            FilterVariant::Classic => Box::new(self.build_classic()?),
            FilterVariant::Partitioned => Box::new(self.build_partitioned()?),
            FilterVariant::Stable => Box::new(self.build_stable()?),
            FilterVariant::Cuckoo => Box::new(self.build_cuckoo()?),
            FilterVariant::Scalable => Box::new(self.build_scalable()?),
        })
    }
}

/// Bucket capacity and sustainable load factor for a cuckoo target fpp
fn cuckoo_bucket_shape(fpp: f64) -> (u32, f64) {
    if fpp <= 1e-5 {
        (8, 0.98)
    } else if fpp <= 2e-3 {
        (4, 0.955)
    } else {
        (2, 0.84)
    }
}

/// Buckets decremented per insertion, solved from the stable-point equation
///
/// The stable point `sp` satisfies
/// `sp = (1 / (1 + 1/(P (1/k - 1/m))))^(2^d - 1)` and the target rate is
/// `fpp = (1 - sp)^k`; inverting for `P` gives the decrement budget. Out of
/// range solutions clamp into `[1, m]`.
fn stable_decrements(fpp: f64, num_hashes: u32, num_buckets: u64, bits_per_bucket: u32) -> u64 {
    let k = num_hashes as f64;
    let m = num_buckets as f64;
    let max_value = ((1u64 << bits_per_bucket) - 1) as f64;

    let stable_point = 1.0 - fpp.powf(1.0 / k);
    let per_round = stable_point.powf(1.0 / max_value);
    let spread = 1.0 / k - 1.0 / m;
    let decrements = 1.0 / ((1.0 / per_round - 1.0) * spread);

    if !decrements.is_finite() || decrements < 1.0 {
        1
    } else {
        (decrements as u64).min(num_buckets)
    }
}

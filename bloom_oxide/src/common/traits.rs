//! Core traits shared by all filter variants

use super::error::Result;

/// Approximate set-membership filter
///
/// All operations except [`Filter::close`] take `&self`: filters synchronize
/// internally through striped locks and atomic counters so a single instance
/// can be shared across threads (`Arc<dyn Filter>`).
pub trait Filter: Send + Sync {
    /// Inserts an item.
    ///
    /// Returns `true` when the filter state changed (or, for the cuckoo
    /// variant, when the tag was stored). A cuckoo filter that exhausts its
    /// eviction budget returns `false`; that outcome is logged, not raised.
    fn put(&self, item: &[u8]) -> bool;

    /// Queries membership.
    ///
    /// `false` means the item was definitely never inserted (except for the
    /// stable variant, which evicts stale items by design); `true` may be a
    /// false positive.
    fn might_contain(&self, item: &[u8]) -> bool;

    /// Removes an item.
    ///
    /// Only the cuckoo variant supports removal; the rest return
    /// [`FilterError::Unsupported`](super::FilterError::Unsupported).
    ///
    /// # Errors
    /// `Unsupported` for non-cuckoo variants.
    fn remove(&self, item: &[u8]) -> Result<bool>;

    /// Zeroes the filter state.
    fn clear(&self);

    /// Expected false-positive probability at the current fill.
    fn expected_fpp(&self) -> f64;

    /// Releases backing storage. Idempotent; cascades to owned vectors and
    /// member filters.
    fn close(&mut self);
}

/// Filters whose state is a bit array that unions with a compatible peer
///
/// Kept separate from [`Filter`]: cuckoo and scalable filters cannot merge
/// (their inherent `merge_in_place` always reports `Unsupported`), and
/// merging is typed over `Self` so cross-variant merges are unrepresentable.
pub trait MergeableFilter: Filter {
    /// Bitwise-OR merges `other` into `self`.
    ///
    /// # Errors
    /// [`FilterError::IncompatibleMerge`](super::FilterError::IncompatibleMerge)
    /// when sizes, hash counts, or backing kinds differ.
    fn merge_in_place(&self, other: &Self) -> Result<()>;
}

//! Striped read-write locking over bit and bucket indices
//!
//! A fixed array of read-write locks guards a filter's bit-level records.
//! The stripe for index `i` is `i & (STRIPE_COUNT - 1)`; the count is a power
//! of two so the mapping is a mask. Contention is proportional to stripe
//! collisions, parallelism is bounded by the stripe count.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Number of lock stripes. Must stay a power of two.
pub const STRIPE_COUNT: usize = 32;

const STRIPE_MASK: u64 = (STRIPE_COUNT as u64) - 1;

/// A power-of-two array of read-write lock stripes
pub struct StripedLock {
    stripes: Vec<RwLock<()>>,
}

impl StripedLock {
    /// Creates the stripe array
    pub fn new() -> Self {
        StripedLock {
            stripes: (0..STRIPE_COUNT).map(|_| RwLock::new(())).collect(),
        }
    }

    /// Shared guard for the stripe of `index`
    #[inline]
    pub fn read(&self, index: u64) -> RwLockReadGuard<'_, ()> {
        self.stripes[(index & STRIPE_MASK) as usize].read()
    }

    /// Exclusive guard for the stripe of `index`
    #[inline]
    pub fn write(&self, index: u64) -> RwLockWriteGuard<'_, ()> {
        self.stripes[(index & STRIPE_MASK) as usize].write()
    }

    /// Exclusive guards for every stripe, acquired in ascending order
    ///
    /// Bulk operations (`clear`, merge) hold the full set as a global
    /// barrier; the fixed acquisition order keeps concurrent bulk operations
    /// deadlock-free.
    pub fn write_all(&self) -> Vec<RwLockWriteGuard<'_, ()>> {
        self.stripes.iter().map(|stripe| stripe.write()).collect()
    }
}

impl Default for StripedLock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_stripe_for_aliased_indices() {
        let locks = StripedLock::new();
        // Indices 32 apart share a stripe: a write guard on one blocks the other
        let guard = locks.write(1);
        assert!(locks.stripes[33 & 31].try_write().is_none());
        drop(guard);
        assert!(locks.stripes[1].try_write().is_some());
    }

    #[test]
    fn test_readers_share_a_stripe() {
        let locks = StripedLock::new();
        let first = locks.read(7);
        let second = locks.read(7 + STRIPE_COUNT as u64);
        drop(first);
        drop(second);
    }

    #[test]
    fn test_write_all_covers_every_stripe() {
        let locks = StripedLock::new();
        let guards = locks.write_all();
        assert_eq!(guards.len(), STRIPE_COUNT);
        for stripe in &locks.stripes {
            assert!(stripe.try_read().is_none());
        }
    }
}

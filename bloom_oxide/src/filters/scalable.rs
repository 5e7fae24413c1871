//! Scalable bloom filter
//!
//! An ordered collection of partitioned filters, newest first. Inserts go to
//! the head; when its estimated fill ratio reaches the growth threshold, a
//! fresh member with a geometrically tightened false-positive target is
//! pushed in front, keeping the compound rate near the user's target no
//! matter how far the stream outgrows the initial capacity hint.

use std::fmt;

use parking_lot::RwLock;
use tracing::error;

use crate::common::hash::HashKind;
use crate::common::{Filter, FilterError, Result};
use crate::filters::PartitionedFilter;
use crate::storage::BackingKind;

/// Growing cascade of partitioned bloom filters
pub struct ScalableFilter {
    /// Members, index 0 = newest and active
    members: RwLock<Vec<PartitionedFilter>>,
    expected_items: u64,
    initial_fpp: f64,
    growth_ratio: f64,
    hash: HashKind,
    backing: BackingKind,
}

impl ScalableFilter {
    pub(crate) fn from_parts(
        head: PartitionedFilter,
        expected_items: u64,
        initial_fpp: f64,
        growth_ratio: f64,
        hash: HashKind,
        backing: BackingKind,
    ) -> Self {
        ScalableFilter {
            members: RwLock::new(vec![head]),
            expected_items,
            initial_fpp,
            growth_ratio,
            hash,
            backing,
        }
    }

    /// Inserts an item into the active member, growing first when it is full
    ///
    /// Growth is double-checked: the fill ratio is re-read under the write
    /// lock so concurrent writers promote at most one new member. A member
    /// allocation failure is logged and the insert proceeds into the current
    /// head.
    pub fn put(&self, item: &[u8]) -> bool {
        {
            let members = self.members.read();
            if members[0].estimated_fill_ratio() < self.growth_ratio {
                return members[0].put(item);
            }
        }

        let mut members = self.members.write();
        if members[0].estimated_fill_ratio() >= self.growth_ratio {
            let level = members.len() as i32;
            let member_fpp = self.initial_fpp * self.growth_ratio.powi(level);
            match PartitionedFilter::with_capacity(
                self.expected_items,
                member_fpp,
                self.hash,
                self.backing,
            ) {
                Ok(filter) => members.insert(0, filter),
                Err(err) => error!(error = %err, "scalable filter growth failed"),
            }
        }
        members[0].put(item)
    }

    /// Queries every member, newest first
    pub fn might_contain(&self, item: &[u8]) -> bool {
        let members = self.members.read();
        members.iter().any(|member| member.might_contain(item))
    }

    /// Merging is not supported: two cascades disagree on member count and
    /// per-level sizing, so there is no member-wise union to take
    ///
    /// # Errors
    /// Always [`FilterError::Unsupported`].
    pub fn merge_in_place(&self, _other: &Self) -> Result<()> {
        Err(FilterError::Unsupported {
            operation: "merge",
            variant: "ScalableFilter",
        })
    }

    /// Compound false-positive probability `1 - prod(1 - fpp_i)`
    pub fn expected_fpp(&self) -> f64 {
        let members = self.members.read();
        1.0 - members
            .iter()
            .map(|member| 1.0 - member.expected_fpp())
            .product::<f64>()
    }

    /// Number of member filters
    pub fn depth(&self) -> usize {
        self.members.read().len()
    }

    /// Items accepted across all members
    pub fn num_items(&self) -> u64 {
        self.members.read().iter().map(|m| m.num_items()).sum()
    }

    /// Capacity hint shared by every member
    pub fn expected_items(&self) -> u64 {
        self.expected_items
    }

    /// Fill threshold and per-level fpp tightening ratio
    pub fn growth_ratio(&self) -> f64 {
        self.growth_ratio
    }
}

impl Filter for ScalableFilter {
    fn put(&self, item: &[u8]) -> bool {
        ScalableFilter::put(self, item)
    }

    fn might_contain(&self, item: &[u8]) -> bool {
        ScalableFilter::might_contain(self, item)
    }

    fn remove(&self, _item: &[u8]) -> Result<bool> {
        Err(FilterError::Unsupported {
            operation: "remove",
            variant: "ScalableFilter",
        })
    }

    /// Closes every member but the newest, then clears that one
    ///
    /// The survivor's fill state is not re-examined; a subsequent `put` may
    /// still grow immediately.
    fn clear(&self) {
        let mut members = self.members.write();
        while members.len() > 1 {
            if let Some(mut member) = members.pop() {
                member.close();
            }
        }
        members[0].clear();
    }

    fn expected_fpp(&self) -> f64 {
        ScalableFilter::expected_fpp(self)
    }

    fn close(&mut self) {
        for member in self.members.get_mut().iter_mut() {
            member.close();
        }
    }
}

impl fmt::Debug for ScalableFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalableFilter")
            .field("depth", &self.depth())
            .field("expected_items", &self.expected_items)
            .field("initial_fpp", &self.initial_fpp)
            .field("growth_ratio", &self.growth_ratio)
            .field("expected_fpp", &self.expected_fpp())
            .finish()
    }
}

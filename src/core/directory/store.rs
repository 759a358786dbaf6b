//! Ordered index host for section bitmaps

use crate::core::allocator::bitmap::SectionBitmap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

/// Ordered key-value index keyed by section start page
///
/// Lookups never create entries: `get_mut` only reaches existing keys and
/// `insert_new` never overwrites one.
pub trait SectionStore {
    /// Number of registered sections
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn first_key(&self) -> Option<u64>;

    fn last_key(&self) -> Option<u64>;

    /// Smallest key greater than or equal to `key`
    fn seek_ge(&self, key: u64) -> Option<u64>;

    /// Smallest key strictly greater than `key`
    fn next_key(&self, key: u64) -> Option<u64>;

    /// Largest key strictly smaller than `key`
    fn prev_key(&self, key: u64) -> Option<u64>;

    fn get(&self, key: u64) -> Option<&SectionBitmap>;

    fn get_mut(&mut self, key: u64) -> Option<&mut SectionBitmap>;

    /// Insert a bitmap under a key that must not exist yet
    ///
    /// Returns `false` (leaving the existing value untouched) if it does.
    fn insert_new(&mut self, key: u64, bitmap: SectionBitmap) -> bool;
}

/// In-memory section store backed by a `BTreeMap`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BTreeSectionStore {
    sections: BTreeMap<u64, SectionBitmap>,
}

impl BTreeSectionStore {
    pub fn new() -> Self {
        BTreeSectionStore {
            sections: BTreeMap::new(),
        }
    }

    /// Iterate over sections in key order
    pub fn iter(&self) -> impl Iterator<Item = (u64, &SectionBitmap)> {
        self.sections.iter().map(|(k, v)| (*k, v))
    }
}

impl SectionStore for BTreeSectionStore {
    fn len(&self) -> usize {
        self.sections.len()
    }

    fn first_key(&self) -> Option<u64> {
        self.sections.keys().next().copied()
    }

    fn last_key(&self) -> Option<u64> {
        self.sections.keys().next_back().copied()
    }

    fn seek_ge(&self, key: u64) -> Option<u64> {
        self.sections.range(key..).next().map(|(k, _)| *k)
    }

    fn next_key(&self, key: u64) -> Option<u64> {
        self.sections
            .range((Excluded(key), Unbounded))
            .next()
            .map(|(k, _)| *k)
    }

    fn prev_key(&self, key: u64) -> Option<u64> {
        self.sections.range(..key).next_back().map(|(k, _)| *k)
    }

    fn get(&self, key: u64) -> Option<&SectionBitmap> {
        self.sections.get(&key)
    }

    fn get_mut(&mut self, key: u64) -> Option<&mut SectionBitmap> {
        self.sections.get_mut(&key)
    }

    fn insert_new(&mut self, key: u64, bitmap: SectionBitmap) -> bool {
        match self.sections.entry(key) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(bitmap);
                true
            }
        }
    }
}

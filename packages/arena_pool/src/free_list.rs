use foldhash::{HashMap, HashMapExt};

use crate::SizeClass;

/// Released slots available for reuse, bucketed by exact size class.
///
/// Buckets are created the first time a slot of a given size class is released and are kept
/// (possibly empty) for the lifetime of the pool. Slots are identified by their offset from the
/// start of the arena.
///
/// There is no ordering guarantee among free slots of the same size class.
#[derive(Debug)]
pub(crate) struct FreeList {
    // We use foldhash for better performance with small hash tables.
    buckets: HashMap<SizeClass, Vec<usize>>,
}

impl FreeList {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            buckets: HashMap::new(),
        }
    }

    /// Removes a free slot of the given size class, if there is one.
    #[must_use]
    pub(crate) fn take(&mut self, size: SizeClass) -> Option<usize> {
        self.buckets.get_mut(&size)?.pop()
    }

    /// Makes a slot available for reuse by later allocations of the same size class.
    ///
    /// The slot must not already be in the free list. Only debug builds verify this, as the
    /// check is linear in the bucket size. Release builds rely on the pool refusing a repeated
    /// release (see `RawArenaPool::validate`) before a slot ever gets here.
    pub(crate) fn give(&mut self, size: SizeClass, offset: usize) {
        let bucket = self.buckets.entry(size).or_default();

        debug_assert!(
            !bucket.contains(&offset),
            "slot at offset {offset} is already in the free list"
        );

        bucket.push(offset);
    }

    /// Number of distinct size classes that have ever had a slot released into them.
    #[must_use]
    pub(crate) fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of free slots across all size classes.
    #[must_use]
    pub(crate) fn slot_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }
}

// Approximate priority queue for the search open set.
//
// Items are filed into buckets of fixed width: bucket `floor((p - min) / range)`
// for priority `p`. A cursor tracks the lowest bucket that may hold items, so
// `extract_min` scans forward from the cursor to the first non-empty bucket and
// pops its most recently pushed item. Within a bucket no ordering is kept:
// the extracted item is within `range` of the true minimum, not necessarily the
// minimum itself. Searches that need exact ordering pick a small `range`.
//
// Buckets grow lazily as priorities exceed the current array, up to
// `MAX_BUCKETS`. Priorities past that share the last bucket, which then pops
// newest-first with no ordering at all; the first time that happens the list
// logs it at debug level, since it means the range is too narrow for the
// query. An index map from item to bucket makes `contains` and `remove` O(1)
// to locate plus a short scan within the bucket.
//
// See also: `search.rs`, which sizes the bucket range from the start/goal
// distance.

use log::debug;
use rustc_hash::FxHashMap;
use std::hash::Hash;

/// Smallest accepted bucket width. Narrower ranges are clamped to this.
pub const MIN_BUCKET_RANGE: f32 = 1e-4;

/// Upper bound on the bucket array. Priorities past the last bucket share it.
pub const MAX_BUCKETS: usize = 1 << 16;

/// Bucketed open set keyed by `f32` priority.
#[derive(Clone, Debug)]
pub struct BucketList<T> {
    buckets: Vec<Vec<T>>,
    /// Bucket each queued item was filed in.
    index: FxHashMap<T, usize>,
    min: f32,
    range: f32,
    /// Every bucket below this one is empty.
    cursor: usize,
    /// Set once a priority has been clamped into the last bucket.
    overflowed: bool,
}

impl<T: Copy + Eq + Hash> BucketList<T> {
    /// Create an empty list whose first bucket starts at `min` and whose
    /// buckets are `range` wide.
    pub fn new(range: f32, min: f32) -> Self {
        let range = if range.is_finite() && range > MIN_BUCKET_RANGE {
            range
        } else {
            MIN_BUCKET_RANGE
        };
        Self {
            buckets: Vec::new(),
            index: FxHashMap::default(),
            min: if min.is_finite() { min } else { 0.0 },
            range,
            cursor: 0,
            overflowed: false,
        }
    }

    pub fn range(&self) -> f32 {
        self.range
    }

    /// Whether any priority so far fell past the last bucket.
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, item: &T) -> bool {
        self.index.contains_key(item)
    }

    /// Bucket number for a priority. Priorities below `min` (and NaN) land in
    /// bucket 0, priorities past the last bucket land in the last one.
    fn bucket_of(&self, priority: f32) -> usize {
        let slot = ((priority - self.min) / self.range).floor();
        if slot.is_nan() || slot <= 0.0 {
            0
        } else if slot >= (MAX_BUCKETS - 1) as f32 {
            MAX_BUCKETS - 1
        } else {
            slot as usize
        }
    }

    /// Queue an item. An item already queued is moved to the bucket for the
    /// new priority.
    pub fn push(&mut self, item: T, priority: f32) {
        if self.contains(&item) {
            self.remove(&item);
        }
        let bucket = self.bucket_of(priority);
        if bucket == MAX_BUCKETS - 1 && !self.overflowed {
            self.overflowed = true;
            debug!(
                "bucket list overflow: priority {priority} past {} buckets of width {}; last bucket is unordered",
                MAX_BUCKETS, self.range
            );
        }
        if bucket >= self.buckets.len() {
            self.buckets.resize_with(bucket + 1, Vec::new);
        }
        self.buckets[bucket].push(item);
        self.index.insert(item, bucket);
        if bucket < self.cursor {
            self.cursor = bucket;
        }
    }

    /// Remove a queued item. Returns false if it was not queued.
    pub fn remove(&mut self, item: &T) -> bool {
        let Some(bucket) = self.index.remove(item) else {
            return false;
        };
        let items = &mut self.buckets[bucket];
        if let Some(pos) = items.iter().position(|i| i == item) {
            items.remove(pos);
        }
        true
    }

    /// Pop an item from the lowest non-empty bucket.
    pub fn extract_min(&mut self) -> Option<T> {
        if self.index.is_empty() {
            self.cursor = 0;
            return None;
        }
        while self.cursor < self.buckets.len() {
            if let Some(item) = self.buckets[self.cursor].pop() {
                self.index.remove(&item);
                return Some(item);
            }
            self.cursor += 1;
        }
        None
    }

    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.index.clear();
        self.cursor = 0;
        self.overflowed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn extract_in_bucket_order() {
        let mut list = BucketList::new(1.0, 0.0);
        list.push(3u32, 3.5);
        list.push(1u32, 1.2);
        list.push(2u32, 2.9);
        list.push(0u32, 0.1);
        assert_eq!(list.len(), 4);
        let order: Vec<_> = std::iter::from_fn(|| list.extract_min()).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
        assert!(list.is_empty());
    }

    #[test]
    fn same_bucket_pops_last_pushed() {
        let mut list = BucketList::new(10.0, 0.0);
        list.push(1u32, 1.0);
        list.push(2u32, 9.0);
        assert_eq!(list.extract_min(), Some(2));
        assert_eq!(list.extract_min(), Some(1));
    }

    #[test]
    fn remove_and_contains() {
        let mut list = BucketList::new(1.0, 0.0);
        list.push(7u32, 4.0);
        list.push(8u32, 4.0);
        assert!(list.contains(&7));
        assert!(list.remove(&7));
        assert!(!list.contains(&7));
        assert!(!list.remove(&7));
        assert_eq!(list.extract_min(), Some(8));
        assert_eq!(list.extract_min(), None);
    }

    #[test]
    fn push_after_extract_rewinds_cursor() {
        let mut list = BucketList::new(1.0, 0.0);
        list.push(1u32, 5.0);
        assert_eq!(list.extract_min(), Some(1));
        list.push(2u32, 8.0);
        list.push(3u32, 0.5);
        assert_eq!(list.extract_min(), Some(3));
        assert_eq!(list.extract_min(), Some(2));
    }

    #[test]
    fn repush_moves_item() {
        let mut list = BucketList::new(1.0, 0.0);
        list.push(1u32, 9.0);
        list.push(2u32, 5.0);
        list.push(1u32, 2.0);
        assert_eq!(list.len(), 2);
        assert_eq!(list.extract_min(), Some(1));
        assert_eq!(list.extract_min(), Some(2));
    }

    #[test]
    fn degenerate_range_and_priorities() {
        let mut list = BucketList::new(0.0, 0.0);
        assert_eq!(list.range(), MIN_BUCKET_RANGE);
        list.push(1u32, f32::INFINITY);
        list.push(2u32, -3.0);
        list.push(3u32, f32::NAN);
        assert_eq!(list.len(), 3);
        let mut out: Vec<_> = std::iter::from_fn(|| list.extract_min()).collect();
        assert_eq!(out.pop(), Some(1));
    }

    #[test]
    fn far_priorities_share_the_last_bucket() {
        let mut list = BucketList::new(0.01, 0.0);
        list.push(1u32, 5.0);
        assert!(!list.overflowed());
        // 0.01-wide buckets run out long before 1000.
        list.push(2, 1000.0);
        list.push(3, 2000.0);
        assert!(list.overflowed());
        assert_eq!(list.extract_min(), Some(1));
        // Past the cap, order is lost: newest first.
        assert_eq!(list.extract_min(), Some(3));
        assert_eq!(list.extract_min(), Some(2));
        list.clear();
        assert!(!list.overflowed());
    }

    #[test]
    fn clear_empties() {
        let mut list = BucketList::new(1.0, 0.0);
        list.push(1u32, 1.0);
        list.push(2u32, 3.0);
        list.clear();
        assert!(list.is_empty());
        assert_eq!(list.extract_min(), None);
    }

    proptest! {
        #[test]
        fn distinct_bucket_priorities_extract_sorted(
            slots in proptest::collection::btree_set(0u32..500, 1..60)
        ) {
            // One item per bucket, so extraction order is exact.
            let mut list = BucketList::new(1.0, 0.0);
            for &s in slots.iter().rev() {
                list.push(s, s as f32 + 0.5);
            }
            let mut prev = None;
            while let Some(item) = list.extract_min() {
                if let Some(p) = prev {
                    prop_assert!(item > p);
                }
                prev = Some(item);
            }
            prop_assert!(list.is_empty());
        }

        #[test]
        fn extraction_stays_within_one_bucket_of_min(
            priorities in proptest::collection::vec(0.0f32..100.0, 1..80)
        ) {
            let range = 2.0;
            let mut list = BucketList::new(range, 0.0);
            for (i, &p) in priorities.iter().enumerate() {
                list.push(i, p);
            }
            let mut remaining: Vec<(usize, f32)> = priorities.iter().copied().enumerate().collect();
            while let Some(item) = list.extract_min() {
                let true_min = remaining.iter().map(|&(_, p)| p).fold(f32::INFINITY, f32::min);
                let pos = remaining.iter().position(|&(i, _)| i == item).unwrap();
                let (_, p) = remaining.swap_remove(pos);
                prop_assert!(p - true_min < range);
            }
            prop_assert!(remaining.is_empty());
        }
    }
}

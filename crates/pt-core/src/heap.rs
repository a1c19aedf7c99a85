//! A fixed-capacity indexed min-heap.
//!
//! Ordinary binary heaps don't support "find and update the entry for this
//! key" without a linear scan. This heap keeps a secondary id→index map
//! alongside the backing array so lookups, updates, and removals by key are
//! all O(log N), which is what the top-N sampler needs when the same
//! process reappears scan after scan.

use std::collections::HashMap;
use std::hash::Hash;

/// An item the heap can order and look up by a stable identifier.
pub trait HeapItem {
    /// Stable identifier type, e.g. a process id.
    type Id: Copy + Eq + Hash;

    fn heap_id(&self) -> Self::Id;
    fn heap_score(&self) -> f64;
}

/// Outcome of [`IndexedMinHeap::insert_or_replace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new slot was created (heap was below capacity).
    Inserted,
    /// The existing entry for this id was overwritten and re-heapified.
    Updated,
    /// The heap was full and the new item's score did not exceed the
    /// current minimum, so it was not admitted.
    Rejected,
}

/// A fixed-capacity min-heap keyed by [`HeapItem::heap_id`], ordered by
/// [`HeapItem::heap_score`].
///
/// The root (index 0) always holds the lowest-scoring tracked item, so a
/// full heap can reject or evict in O(log N) by comparing against the root.
#[derive(Debug)]
pub struct IndexedMinHeap<T: HeapItem> {
    items: Vec<T>,
    index: HashMap<T::Id, usize>,
    capacity: usize,
}

impl<T: HeapItem> IndexedMinHeap<T> {
    /// Create an empty heap with the given fixed capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, id: T::Id) -> bool {
        self.index.contains_key(&id)
    }

    /// Score currently held by `id`, if tracked.
    pub fn score_of(&self, id: T::Id) -> Option<f64> {
        self.index.get(&id).map(|&i| self.items[i].heap_score())
    }

    /// Insert a new item, or overwrite the item currently tracked under the
    /// same id. See [`InsertOutcome`] for the three possible results.
    pub fn insert_or_replace(&mut self, item: T) -> InsertOutcome {
        let id = item.heap_id();

        if let Some(&i) = self.index.get(&id) {
            self.items[i] = item;
            self.fix_from(i);
            return InsertOutcome::Updated;
        }

        if self.items.len() < self.capacity {
            let i = self.items.len();
            self.index.insert(id, i);
            self.items.push(item);
            self.sift_up(i);
            return InsertOutcome::Inserted;
        }

        // Full: admit only if strictly better than the current minimum.
        if self.capacity == 0 || item.heap_score() <= self.items[0].heap_score() {
            return InsertOutcome::Rejected;
        }

        let evicted_id = self.items[0].heap_id();
        self.index.remove(&evicted_id);
        self.items[0] = item;
        self.index.insert(id, 0);
        self.sift_down(0);
        InsertOutcome::Inserted
    }

    /// Remove the item tracked under `id`, if present. Returns whether
    /// anything was removed.
    pub fn remove(&mut self, id: T::Id) -> bool {
        let Some(&i) = self.index.get(&id) else {
            return false;
        };
        self.index.remove(&id);

        let last = self.items.len() - 1;
        if i != last {
            self.items.swap(i, last);
            let moved_id = self.items[i].heap_id();
            self.index.insert(moved_id, i);
        }
        self.items.pop();

        if i < self.items.len() {
            self.fix_from(i);
        }
        true
    }

    /// Snapshot the top `n` items, descending by score. Read-only: does not
    /// mutate the heap. O(N log N).
    pub fn top_n(&self, n: usize) -> Vec<&T>
    where
        T::Id: Ord,
    {
        let mut refs: Vec<&T> = self.items.iter().collect();
        refs.sort_by(|a, b| {
            b.heap_score()
                .partial_cmp(&a.heap_score())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.heap_id().cmp(&b.heap_id()))
        });
        refs.truncate(n);
        refs
    }

    /// Iterate all tracked items in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Re-establish the heap property at `i`, whose score may have moved in
    /// either direction. Tries sift-down first (the common case: a score
    /// increased, which is the same direction eviction pushes), then
    /// sift-up (the score decreased).
    fn fix_from(&mut self, i: usize) {
        let moved_down = self.sift_down(i);
        if !moved_down {
            self.sift_up(i);
        }
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.items[i].heap_score() < self.items[parent].heap_score() {
                self.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
    }

    /// Returns whether any swap occurred.
    fn sift_down(&mut self, mut i: usize) -> bool {
        let mut moved = false;
        loop {
            let left = 2 * i + 1;
            let right = 2 * i + 2;
            let mut smallest = i;

            if left < self.items.len()
                && self.items[left].heap_score() < self.items[smallest].heap_score()
            {
                smallest = left;
            }
            if right < self.items.len()
                && self.items[right].heap_score() < self.items[smallest].heap_score()
            {
                smallest = right;
            }
            if smallest == i {
                break;
            }
            self.swap(i, smallest);
            i = smallest;
            moved = true;
        }
        moved
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.items.swap(a, b);
        self.index.insert(self.items[a].heap_id(), a);
        self.index.insert(self.items[b].heap_id(), b);
    }

    /// Check that the id→index map and the min-heap property both hold.
    /// Exposed for tests and property checks, not part of the operational API.
    #[cfg(test)]
    fn check_invariants(&self) {
        for (&id, &i) in &self.index {
            assert_eq!(self.items[i].heap_id(), id);
        }
        for i in 0..self.items.len() {
            if i > 0 {
                let parent = (i - 1) / 2;
                assert!(self.items[parent].heap_score() <= self.items[i].heap_score());
            }
        }
        assert_eq!(self.index.len(), self.items.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    struct TestItem {
        id: u32,
        score: i64,
    }

    impl HeapItem for TestItem {
        type Id = u32;
        fn heap_id(&self) -> u32 {
            self.id
        }
        fn heap_score(&self) -> f64 {
            self.score as f64
        }
    }

    fn item(id: u32, score: i64) -> TestItem {
        TestItem { id, score }
    }

    #[test]
    fn heap_full_higher_score_insert() {
        let mut heap = IndexedMinHeap::new(3);
        heap.insert_or_replace(item(1, 10));
        heap.insert_or_replace(item(2, 20));
        heap.insert_or_replace(item(3, 5));
        heap.check_invariants();

        let outcome = heap.insert_or_replace(item(4, 25));
        assert_eq!(outcome, InsertOutcome::Inserted);
        heap.check_invariants();

        let top = heap.top_n(3);
        let ids: Vec<u32> = top.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![4, 2, 1]);
        assert!(!heap.contains(3));
    }

    #[test]
    fn heap_update_existing() {
        let mut heap = IndexedMinHeap::new(3);
        heap.insert_or_replace(item(1, 10));
        heap.insert_or_replace(item(2, 20));
        heap.insert_or_replace(item(3, 5));

        let outcome = heap.insert_or_replace(item(1, 30));
        assert_eq!(outcome, InsertOutcome::Updated);
        heap.check_invariants();

        let top = heap.top_n(3);
        let ids: Vec<u32> = top.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn reject_when_full_and_not_better() {
        let mut heap = IndexedMinHeap::new(2);
        heap.insert_or_replace(item(1, 10));
        heap.insert_or_replace(item(2, 20));
        let outcome = heap.insert_or_replace(item(3, 5));
        assert_eq!(outcome, InsertOutcome::Rejected);
        assert!(!heap.contains(3));
        assert_eq!(heap.len(), 2);
    }

    #[test]
    fn remove_middle_preserves_invariants() {
        let mut heap = IndexedMinHeap::new(10);
        for (id, score) in [(1, 5), (2, 3), (3, 8), (4, 1), (5, 9), (6, 2)] {
            heap.insert_or_replace(item(id, score));
        }
        heap.check_invariants();
        assert!(heap.remove(3));
        heap.check_invariants();
        assert!(!heap.contains(3));
        assert_eq!(heap.len(), 5);
    }

    #[test]
    fn remove_nonexistent_is_noop() {
        let mut heap: IndexedMinHeap<TestItem> = IndexedMinHeap::new(4);
        heap.insert_or_replace(item(1, 1));
        assert!(!heap.remove(99));
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn top_n_is_read_only() {
        let mut heap = IndexedMinHeap::new(5);
        for (id, score) in [(1, 1), (2, 2), (3, 3)] {
            heap.insert_or_replace(item(id, score));
        }
        let before = heap.len();
        let _ = heap.top_n(2);
        assert_eq!(heap.len(), before);
        heap.check_invariants();
    }

    #[test]
    fn zero_capacity_always_rejects() {
        let mut heap: IndexedMinHeap<TestItem> = IndexedMinHeap::new(0);
        let outcome = heap.insert_or_replace(item(1, 100));
        assert_eq!(outcome, InsertOutcome::Rejected);
    }

    #[test]
    fn many_random_mutations_preserve_invariants() {
        // Deterministic pseudo-random sequence (no RNG crate dependency).
        let mut heap = IndexedMinHeap::new(20);
        let mut state: u64 = 88172645463325252;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };
        for _ in 0..500 {
            let id = (next() % 30) as u32;
            let op = next() % 3;
            if op == 0 {
                heap.remove(id);
            } else {
                let score = (next() % 1000) as i64;
                heap.insert_or_replace(item(id, score));
            }
            heap.check_invariants();
        }
    }
}

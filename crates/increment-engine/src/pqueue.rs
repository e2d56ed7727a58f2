//! Component B — a min-heap of [`Meta`] keyed by start-timestamp order.
//!
//! Ordering here cannot be expressed through `std::cmp::Ord`: two
//! timestamps only compare meaningfully through a live [`TotalOrder`]
//! (`compare` re-reads a tag from the order-maintenance slab, which can be
//! rewritten by relabeling — see `order.rs`). So this is a hand-rolled
//! binary heap over a `Vec`, taking `&TotalOrder` at every comparison
//! point instead of deriving `Ord`.

use rustc_hash::FxHashSet;

use crate::node::Meta;
use crate::order::TotalOrder;

#[derive(Default)]
pub(crate) struct PriorityQueue {
    heap: Vec<Meta>,
    present: FxHashSet<u64>,
}

impl PriorityQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_capacity(cap: usize) -> Self {
        Self {
            heap: Vec::with_capacity(cap),
            present: FxHashSet::default(),
        }
    }

    /// Insert `m`, returning `true` if it was not already present
    /// (dedup by identity, per the component contract).
    pub(crate) fn add(&mut self, to: &TotalOrder, m: Meta) -> bool {
        if !self.present.insert(m.id) {
            return false;
        }
        self.heap.push(m);
        self.sift_up(to, self.heap.len() - 1);
        true
    }

    /// Remove `m` if present, returning whether it was found.
    pub(crate) fn remove(&mut self, to: &TotalOrder, m: &Meta) -> bool {
        if !self.present.remove(&m.id) {
            return false;
        }
        if let Some(pos) = self.heap.iter().position(|e| e.id == m.id) {
            let last = self.heap.len() - 1;
            self.heap.swap(pos, last);
            self.heap.pop();
            if pos < self.heap.len() {
                self.sift_down(to, pos);
                self.sift_up(to, pos);
            }
        }
        true
    }

    pub(crate) fn top(&self) -> Option<&Meta> {
        self.heap.first()
    }

    pub(crate) fn pop(&mut self, to: &TotalOrder) -> Option<Meta> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let m = self.heap.pop()?;
        self.present.remove(&m.id);
        if !self.heap.is_empty() {
            self.sift_down(to, 0);
        }
        Some(m)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    fn less(&self, to: &TotalOrder, a: usize, b: usize) -> bool {
        to.compare(self.heap[a].start.get(), self.heap[b].start.get()) == std::cmp::Ordering::Less
    }

    fn sift_up(&mut self, to: &TotalOrder, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.less(to, i, parent) {
                self.heap.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, to: &TotalOrder, start: usize) {
        let mut idx = start;
        loop {
            let l = 2 * idx + 1;
            let r = 2 * idx + 2;
            let mut smallest = idx;
            if l < self.heap.len() && self.less(to, l, smallest) {
                smallest = l;
            }
            if r < self.heap.len() && self.less(to, r, smallest) {
                smallest = r;
            }
            if smallest == idx {
                break;
            }
            self.heap.swap(idx, smallest);
            idx = smallest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::MetaInner;
    use crate::order::TotalOrder;

    fn meta_at(to: &mut TotalOrder, after: crate::order::Timestamp) -> Meta {
        let m = MetaInner::new_constant();
        m.start.set(to.add_next(after));
        m
    }

    #[test]
    fn pops_in_ascending_start_order() {
        let (mut to, root) = TotalOrder::create();
        let mut pq = PriorityQueue::new();
        let mut cursor = root;
        let mut metas = Vec::new();
        for _ in 0..20 {
            let m = meta_at(&mut to, cursor);
            cursor = m.start.get();
            metas.push(m.clone());
            pq.add(&to, m);
        }
        // Insert out of construction order to prove the heap, not
        // insertion order, drives `pop`.
        let mut popped = Vec::new();
        while let Some(m) = pq.pop(&to) {
            popped.push(m.start.get());
        }
        let mut expected: Vec<_> = metas.iter().map(|m| m.start.get()).collect();
        expected.sort_by(|a, b| to.compare(*a, *b));
        assert_eq!(popped, expected);
    }

    #[test]
    fn duplicate_add_is_noop() {
        let (mut to, root) = TotalOrder::create();
        let mut pq = PriorityQueue::new();
        let m = meta_at(&mut to, root);
        assert!(pq.add(&to, m.clone()));
        assert!(!pq.add(&to, m.clone()));
        assert_eq!(pq.len(), 1);
    }

    #[test]
    fn pop_from_empty_is_none() {
        let (to, _root) = TotalOrder::create();
        let mut pq = PriorityQueue::new();
        assert!(pq.pop(&to).is_none());
    }

    #[test]
    fn remove_drops_one_entry_and_preserves_the_rest() {
        let (mut to, root) = TotalOrder::create();
        let mut pq = PriorityQueue::new();
        let mut cursor = root;
        let mut metas = Vec::new();
        for _ in 0..10 {
            let m = meta_at(&mut to, cursor);
            cursor = m.start.get();
            metas.push(m.clone());
            pq.add(&to, m);
        }
        assert!(pq.remove(&to, &metas[4]));
        assert!(!pq.remove(&to, &metas[4]));
        assert_eq!(pq.len(), 9);

        let mut popped = Vec::new();
        while let Some(m) = pq.pop(&to) {
            popped.push(m.id);
        }
        let mut expected: Vec<u64> = metas.iter().map(|m| m.id).collect();
        expected.remove(4);
        assert_eq!(popped, expected);
    }
}

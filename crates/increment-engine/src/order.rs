//! Component A — order maintenance.
//!
//! A totally ordered set of timestamps supporting `insert_after` in
//! amortized O(1), O(1) comparison, and bulk removal (`splice`) in
//! amortized O(1) per removed stamp. Internally this is a doubly linked
//! list over a slab (`Vec<Slot>` plus a free-list), where each live slot
//! carries an integer tag used only to answer `compare`. Tags are
//! re-spaced ("relabeled") over a window around an insertion point
//! whenever two neighboring tags run out of room between them, in the
//! style of Dietz & Sleator's order-maintenance structure; relabeling
//! never changes the relative order of any two live timestamps, only the
//! numeric gaps between them, so a timestamp handle never needs to cache
//! a tag value — `compare` always re-reads the live tag through the slab.

/// An opaque handle into a [`TotalOrder`]. Cheap to copy, meaningless
/// without the `TotalOrder` it was issued from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    idx: u32,
    gen: u32,
}

impl Timestamp {
    /// The sentinel timestamp used by constant cells: never valid, never
    /// comparable, always distinguishable from a real stamp.
    pub const NULL: Timestamp = Timestamp {
        idx: u32::MAX,
        gen: u32::MAX,
    };

    #[inline]
    pub fn is_null(self) -> bool {
        self == Self::NULL
    }
}

struct Slot {
    tag: u64,
    prev: Option<u32>,
    next: Option<u32>,
    gen: u32,
    alive: bool,
    invalidator: Option<Box<dyn FnMut()>>,
}

/// Gap left between the root timestamp and the first insertion, and the
/// unit of initial spacing used whenever a window is relabeled.
const INITIAL_GAP: u64 = 1 << 32;

pub struct TotalOrder {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: Timestamp,
    /// bumped on every slot reuse so stale handles never alias a new slot
    next_gen: u32,
}

impl TotalOrder {
    /// Create a fresh order with a single root timestamp (`eager_start` in
    /// the change-propagation engine).
    pub fn create() -> (Self, Timestamp) {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> (Self, Timestamp) {
        Self::with_capacity_and_gap(capacity, INITIAL_GAP)
    }

    /// As [`TotalOrder::with_capacity`], but with an explicit initial tag
    /// gap (`EngineConfig::relabel_gap`) instead of the default `1 << 32`.
    pub fn with_capacity_and_gap(capacity: usize, gap: u64) -> (Self, Timestamp) {
        let mut slots = Vec::with_capacity(capacity.max(1));
        slots.push(Slot {
            tag: gap,
            prev: None,
            next: None,
            gen: 0,
            alive: true,
            invalidator: None,
        });
        let root = Timestamp { idx: 0, gen: 0 };
        (
            Self {
                slots,
                free: Vec::new(),
                root,
                next_gen: 1,
            },
            root,
        )
    }

    pub fn null(&self) -> Timestamp {
        Timestamp::NULL
    }

    #[inline]
    pub fn is_valid(&self, t: Timestamp) -> bool {
        if t.is_null() {
            return false;
        }
        match self.slots.get(t.idx as usize) {
            Some(slot) => slot.alive && slot.gen == t.gen,
            None => false,
        }
    }

    #[inline]
    fn slot(&self, t: Timestamp) -> &Slot {
        assert!(
            self.is_valid(t),
            "order-maintenance: timestamp used after invalidation"
        );
        &self.slots[t.idx as usize]
    }

    #[inline]
    fn slot_mut(&mut self, t: Timestamp) -> &mut Slot {
        assert!(
            self.is_valid(t),
            "order-maintenance: timestamp used after invalidation"
        );
        &mut self.slots[t.idx as usize]
    }

    /// Total, transitive, antisymmetric comparison. O(1): a direct tag read.
    pub fn compare(&self, a: Timestamp, b: Timestamp) -> std::cmp::Ordering {
        self.slot(a).tag.cmp(&self.slot(b).tag)
    }

    /// Insert a fresh timestamp immediately after `t`. Amortized O(1): most
    /// calls find room between `t` and its successor directly; the rare
    /// case relabels a small forward window first.
    pub fn add_next(&mut self, t: Timestamp) -> Timestamp {
        let idx = {
            assert!(self.is_valid(t), "add_next on an invalid timestamp");
            t.idx
        };
        let next_idx = self.slots[idx as usize].next;
        let lo = self.slots[idx as usize].tag;
        let hi = next_idx
            .map(|n| self.slots[n as usize].tag)
            .unwrap_or(u64::MAX);

        if hi - lo <= 1 {
            self.relabel_from(idx);
            return self.add_next(t);
        }
        let new_tag = lo + (hi - lo) / 2;
        self.insert_after_idx(idx, next_idx, new_tag)
    }

    fn insert_after_idx(&mut self, idx: u32, next_idx: Option<u32>, tag: u64) -> Timestamp {
        let gen = self.next_gen;
        self.next_gen += 1;
        let new_idx = if let Some(free_idx) = self.free.pop() {
            self.slots[free_idx as usize] = Slot {
                tag,
                prev: Some(idx),
                next: next_idx,
                gen,
                alive: true,
                invalidator: None,
            };
            free_idx
        } else {
            self.slots.push(Slot {
                tag,
                prev: Some(idx),
                next: next_idx,
                gen,
                alive: true,
                invalidator: None,
            });
            (self.slots.len() - 1) as u32
        };
        self.slots[idx as usize].next = Some(new_idx);
        if let Some(n) = next_idx {
            self.slots[n as usize].prev = Some(new_idx);
        }
        Timestamp { idx: new_idx, gen }
    }

    /// Re-space tags over a window starting at `idx` and doubling forward
    /// until there is enough room to fit one more element per gap.
    fn relabel_from(&mut self, idx: u32) {
        let mut window = 2usize;
        loop {
            let mut ids = Vec::with_capacity(window + 1);
            ids.push(idx);
            let mut cur = idx;
            while ids.len() <= window {
                match self.slots[cur as usize].next {
                    Some(n) => {
                        ids.push(n);
                        cur = n;
                    }
                    None => break,
                }
            }
            let lo = self.slots[idx as usize].tag;
            let hi = self.slots[cur as usize]
                .next
                .map(|n| self.slots[n as usize].tag)
                .unwrap_or(u64::MAX);
            // room needed: ids.len()-1 slots (anchor excluded) strictly
            // between lo and hi (hi itself excluded, it borders the window).
            let span = hi.saturating_sub(lo);
            let slots_needed = (ids.len() - 1) as u64;
            if slots_needed == 0 || span / (slots_needed + 1) >= 1 {
                let step = span / (slots_needed + 1);
                let mut tag = lo;
                for &id in ids.iter().skip(1) {
                    tag += step.max(1);
                    self.slots[id as usize].tag = tag;
                }
                return;
            }
            if slots_needed as usize + 1 >= self.live_count() {
                // Whole list needs more room than u64 tag space has given the
                // current density: fall back to spacing evenly over the
                // entire space from the root.
                let total = self.live_count();
                let step = (u64::MAX / (total as u64 + 2)).max(1);
                let mut tag = 0u64;
                let mut cur = self.root.idx;
                loop {
                    self.slots[cur as usize].tag = tag;
                    tag += step;
                    match self.slots[cur as usize].next {
                        Some(n) => cur = n,
                        None => return,
                    }
                }
            }
            window *= 2;
        }
    }

    fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.alive).count()
    }

    /// Register a callback to run exactly once, when `t` is removed by a
    /// future [`TotalOrder::splice`].
    pub fn set_invalidator(&mut self, t: Timestamp, f: impl FnMut() + 'static) {
        self.slot_mut(t).invalidator = Some(Box::new(f));
    }

    /// Walk live timestamps forward from (and including) `start`, calling
    /// `f` on each until it returns `false` or the list ends.
    pub fn iter(&self, start: Timestamp, mut f: impl FnMut(Timestamp) -> bool) {
        assert!(self.is_valid(start), "iter from an invalid timestamp");
        let mut cur = Some(start.idx);
        while let Some(idx) = cur {
            let slot = &self.slots[idx as usize];
            let t = Timestamp {
                idx,
                gen: slot.gen,
            };
            if !f(t) {
                return;
            }
            cur = slot.next;
        }
    }

    /// Remove every timestamp strictly between `lo` and `hi`, firing each
    /// removed stamp's invalidator exactly once and marking it invalid.
    /// `lo` and `hi` themselves are untouched. Amortized O(1) per removed
    /// stamp: a single forward walk that unlinks and frees slots.
    pub fn splice(&mut self, lo: Timestamp, hi: Timestamp) {
        assert!(self.is_valid(lo), "splice from an invalid lower bound");
        assert!(self.is_valid(hi), "splice to an invalid upper bound");
        debug_assert!(self.compare(lo, hi) != std::cmp::Ordering::Greater);

        let mut to_remove = Vec::new();
        let mut cur = self.slots[lo.idx as usize].next;
        while let Some(idx) = cur {
            if idx == hi.idx {
                break;
            }
            to_remove.push(idx);
            cur = self.slots[idx as usize].next;
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(removed = to_remove.len(), "order::splice");

        for idx in to_remove {
            let next = self.slots[idx as usize].next;
            let prev = self.slots[idx as usize].prev;
            if let Some(p) = prev {
                self.slots[p as usize].next = next;
            }
            if let Some(n) = next {
                self.slots[n as usize].prev = prev;
            }
            let slot = &mut self.slots[idx as usize];
            slot.alive = false;
            if let Some(mut cb) = slot.invalidator.take() {
                cb();
            }
            self.free.push(idx);
        }
    }
}

//! Components C & D — the weak dependent set, and the Node/Meta pair that
//! is the unit of incremental computation.

use std::cell::{Cell as StdCell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use crate::order::Timestamp;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique integer identity for a node.
pub(crate) fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Component C — a per-node set of back-references to dependents that does
/// not keep them alive. Traversal silently drops entries whose referent has
/// already been collected. Most nodes have only a handful of dependents, so
/// the backing store is inline up to 4 entries before it spills to the heap.
#[derive(Default)]
pub(crate) struct WeakDependentSet {
    entries: RefCell<SmallVec<[Weak<MetaInner>; 4]>>,
}

impl WeakDependentSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add `m` as a dependent, deduplicating by identity.
    pub(crate) fn add(&self, m: &Meta) {
        let mut entries = self.entries.borrow_mut();
        if entries
            .iter()
            .filter_map(|w| w.upgrade())
            .any(|existing| existing.id == m.id)
        {
            return;
        }
        entries.push(Rc::downgrade(m));
    }

    /// Remove the entry for a dependent by identity, if present. Dead
    /// entries (referent already collected) are swept out along the way.
    pub(crate) fn remove_by_id(&self, id: u64) {
        self.entries
            .borrow_mut()
            .retain(|w| w.upgrade().map(|m| m.id != id).unwrap_or(false));
    }

    /// Drop all entries. Used when a node is invalidated: nothing should
    /// keep treating it as a live dependency after that.
    pub(crate) fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    /// Visit every live dependent, pruning dead weak references as a side
    /// effect. Iteration order is unspecified, matching the component
    /// contract.
    pub(crate) fn fold(&self, mut f: impl FnMut(&Meta)) {
        let mut entries = self.entries.borrow_mut();
        entries.retain(|w| w.strong_count() > 0);
        let snapshot: Vec<Meta> = entries.iter().filter_map(|w| w.upgrade()).collect();
        drop(entries);
        for m in snapshot {
            f(&m);
        }
    }
}

/// Component D — the bookkeeping record attached to every node: identity,
/// interval, dependents, and the two closures that make a node self
/// re-evaluating (`evaluate`) and self-unmemoizing (`unmemo`).
///
/// `evaluate` and `unmemo` are [`RefCell`]-guarded `Option`s so callers can
/// `take()` them out before invoking them and put them back afterward; this
/// is how the engine avoids ever holding a borrow across a call into
/// arbitrary client code (see `engine::evaluate_meta`), which both sidesteps
/// `RefCell`'s single-writer rule under the re-entrant recursion this engine
/// relies on and satisfies the "recursive, mutually referring closures"
/// resolution called for in the design notes.
pub struct MetaInner {
    pub(crate) id: u64,
    pub(crate) start: StdCell<Timestamp>,
    pub(crate) end: StdCell<Timestamp>,
    pub(crate) dependents: WeakDependentSet,
    /// Nodes this node forced during its current (or most recent) run of
    /// `evaluate`. Kept so that the next re-evaluation can surgically drop
    /// this node from the `dependents` set of anything it stops reading,
    /// instead of leaving a stale back-reference behind.
    pub(crate) reads: RefCell<SmallVec<[Weak<MetaInner>; 4]>>,
    pub(crate) enqueued: StdCell<bool>,
    pub(crate) onstack: StdCell<bool>,
    pub(crate) evaluate: RefCell<Option<Box<dyn FnMut()>>>,
    pub(crate) unmemo: RefCell<Option<Box<dyn FnMut()>>>,
}

pub type Meta = Rc<MetaInner>;

impl MetaInner {
    pub(crate) fn new_constant() -> Meta {
        Rc::new(MetaInner {
            id: next_id(),
            start: StdCell::new(Timestamp::NULL),
            end: StdCell::new(Timestamp::NULL),
            dependents: WeakDependentSet::new(),
            reads: RefCell::new(SmallVec::new()),
            enqueued: StdCell::new(false),
            onstack: StdCell::new(false),
            evaluate: RefCell::new(Some(Box::new(|| {}))),
            unmemo: RefCell::new(None),
        })
    }

    pub(crate) fn is_constant(&self) -> bool {
        self.start.get().is_null()
    }

    /// A non-constant node mid-construction: `start` is already allocated,
    /// `end` follows once the body finishes, `evaluate` is installed by the
    /// caller once the node's value type is known (`MetaInner` itself is
    /// type-erased).
    pub(crate) fn new_thunk(start: Timestamp) -> Meta {
        Rc::new(MetaInner {
            id: next_id(),
            start: StdCell::new(start),
            end: StdCell::new(Timestamp::NULL),
            dependents: WeakDependentSet::new(),
            reads: RefCell::new(SmallVec::new()),
            enqueued: StdCell::new(false),
            onstack: StdCell::new(false),
            evaluate: RefCell::new(None),
            unmemo: RefCell::new(None),
        })
    }

    /// Record that this node forced `target` during its current evaluation,
    /// deduplicating by identity.
    pub(crate) fn record_read(&self, target: &Meta) {
        let mut reads = self.reads.borrow_mut();
        if reads
            .iter()
            .filter_map(|w| w.upgrade())
            .any(|t| t.id == target.id)
        {
            return;
        }
        reads.push(Rc::downgrade(target));
    }

    /// Remove this node from the `dependents` set of everything it read
    /// last time, then forget that list. Called at the start of every
    /// re-evaluation so a node that stops forcing something on one run
    /// doesn't linger as a stale dependent and get spuriously re-enqueued
    /// the next time that something changes.
    pub(crate) fn clear_stale_reads(&self) {
        let prior: Vec<Meta> = self.reads.borrow_mut().drain(..).filter_map(|w| w.upgrade()).collect();
        for target in prior {
            target.dependents.remove_by_id(self.id);
        }
    }
}

/// An articulation: a handle to a [`Node`]. Cheap to clone (an `Rc` bump).
pub struct Art<T> {
    pub(crate) node: Rc<NodeData<T>>,
}

impl<T> Clone for Art<T> {
    fn clone(&self) -> Self {
        Art {
            node: self.node.clone(),
        }
    }
}

impl<T> Art<T> {
    pub(crate) fn meta(&self) -> &Meta {
        &self.node.meta
    }

    pub fn id(&self) -> u64 {
        self.node.meta.id
    }
}

pub struct NodeData<T> {
    pub(crate) value: RefCell<T>,
    pub(crate) meta: Meta,
}

/// An input cell: an [`Art`] with no interval, mutable via [`Cell::set`].
/// `set` is reachable only through this wrapper type, never through an
/// `Art<T>` returned by `thunk`/`mk_mfn`, so a computed node can never be
/// mutated directly — only the input cells it reads can.
pub struct Cell<T> {
    art: Art<T>,
}

impl<T> Clone for Cell<T> {
    fn clone(&self) -> Self {
        Cell {
            art: self.art.clone(),
        }
    }
}

impl<T> Cell<T> {
    pub(crate) fn from_art(art: Art<T>) -> Self {
        debug_assert!(art.meta().is_constant());
        Cell { art }
    }

    /// Borrow this cell as the general handle, for passing to `force` or
    /// into a memoized function's argument position.
    pub fn art(&self) -> Art<T> {
        self.art.clone()
    }

    pub fn id(&self) -> u64 {
        self.art.id()
    }
}

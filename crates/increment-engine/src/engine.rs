//! Component E — change propagation, plus the process-wide engine context
//! that packages the runtime's global mutable state: the order-maintenance
//! list, the priority queue, the eval stack, and the three cursors
//! (`eager_start`, `eager_now`, `eager_finger`).
//!
//! `EngineContext` is a plain struct so a Client could in principle own one
//! directly; in practice every node's `evaluate`/`unmemo` closure and every
//! call in `memo.rs`/`api.rs` reaches it through a thread-local default
//! (`with_ctx`), which covers the common case of a single graph per thread.

use std::cell::RefCell;
use std::rc::Rc;

use crate::data::Data;
use crate::error::EngineError;
use crate::node::{Art, Meta, MetaInner, NodeData};
use crate::order::{Timestamp, TotalOrder};
use crate::pqueue::PriorityQueue;
use crate::stats::Stats;

/// Parameterizes a process-wide [`EngineContext`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Priority-queue pre-allocation hint.
    pub initial_queue_capacity: usize,
    /// Order-maintenance slab pre-allocation hint.
    pub initial_timestamp_capacity: usize,
    /// Initial tag gap used by the order-maintenance list's relabeling
    /// pass; larger values delay the first relabel at the cost of a wider
    /// tag space.
    pub relabel_gap: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            initial_queue_capacity: 64,
            initial_timestamp_capacity: 256,
            relabel_gap: 1 << 32,
        }
    }
}

/// Lifecycle hooks around evaluation, invalidation, and detected
/// re-entrancy. Purely observational: no hook return value influences
/// propagation.
pub trait CalcObserver {
    fn on_eval_start(&self, id: u64);
    fn on_eval_complete(&self, id: u64);
    fn on_invalidate(&self, id: u64);
    fn on_cycle_detected(&self, id: u64);
}

/// Default no-op observer.
impl CalcObserver for () {
    fn on_eval_start(&self, _id: u64) {}
    fn on_eval_complete(&self, _id: u64) {}
    fn on_invalidate(&self, _id: u64) {}
    fn on_cycle_detected(&self, _id: u64) {}
}

pub struct EngineContext {
    pub(crate) order: TotalOrder,
    pub(crate) queue: PriorityQueue,
    pub(crate) stack: Vec<Meta>,
    pub(crate) eager_start: Timestamp,
    pub(crate) eager_now: Timestamp,
    pub(crate) eager_finger: Timestamp,
    pub(crate) stats: Stats,
    pub(crate) observer: Rc<dyn CalcObserver>,
    pub(crate) config: EngineConfig,
}

impl EngineContext {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let (order, root) =
            TotalOrder::with_capacity_and_gap(config.initial_timestamp_capacity, config.relabel_gap);
        EngineContext {
            order,
            queue: PriorityQueue::with_capacity(config.initial_queue_capacity),
            stack: Vec::new(),
            eager_start: root,
            eager_now: root,
            eager_finger: root,
            stats: Stats::default(),
            observer: Rc::new(()),
            config,
        }
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static ENGINE: RefCell<EngineContext> = RefCell::new(EngineContext::new());
}

/// Run `f` against the process-wide context. Every call must be short and
/// must not itself call into client code or another `with_ctx`, or the
/// thread-local `RefCell` panics on a double borrow — the single rule that
/// keeps this engine's recursion safe.
pub(crate) fn with_ctx<R>(f: impl FnOnce(&mut EngineContext) -> R) -> R {
    ENGINE.with(|cell| f(&mut cell.borrow_mut()))
}

/// Replace the process-wide observer.
pub fn set_observer(observer: Rc<dyn CalcObserver>) {
    with_ctx(|ctx| ctx.observer = observer);
}

/// Discard the process-wide context and start a fresh one with the given
/// configuration. Every live `Art`/`Cell` handle from before this call is
/// left dangling against the new context (its timestamps no longer resolve
/// against any live `TotalOrder`) — intended for test isolation between
/// independent Client programs sharing one OS thread, not for runtime use.
pub fn reset_with_config(config: EngineConfig) {
    with_ctx(|ctx| *ctx = EngineContext::with_config(config));
}

/// A snapshot of the monotonic engine counters.
pub fn stats() -> crate::stats::StatsSnapshot {
    with_ctx(|ctx| ctx.stats.snapshot())
}

/// RAII guard around one frame of the eval stack: pushes with `onstack=true`
/// on construction, pops and clears `onstack` on drop, including on unwind,
/// so a panicking user function still leaves the stack and the node's
/// `onstack` flag in a consistent state.
struct StackGuard {
    meta: Meta,
}

impl StackGuard {
    fn enter(meta: Meta) -> Self {
        with_ctx(|ctx| {
            if meta.onstack.get() {
                ctx.observer.on_cycle_detected(meta.id);
                EngineError::ReentrantForce { id: meta.id }.panic_with();
            }
            meta.onstack.set(true);
            ctx.stack.push(meta.clone());
            ctx.observer.on_eval_start(meta.id);
        });
        StackGuard { meta }
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        self.meta.onstack.set(false);
        with_ctx(|ctx| {
            debug_assert_eq!(
                ctx.stack.last().map(|m| m.id),
                Some(self.meta.id),
                "eval stack popped out of LIFO order"
            );
            ctx.stack.pop();
            ctx.observer.on_eval_complete(self.meta.id);
        });
    }
}

/// Dependency edge creation: if the eval stack is non-empty, the frame on
/// top becomes a dependent of `meta`, and `meta` is recorded as something
/// the top frame read this run (so a future re-evaluation of the top frame
/// can tell whether it stopped reading `meta`). Reads performed outside any
/// evaluation create no edge.
pub(crate) fn make_dependency_edge(meta: &Meta) {
    with_ctx(|ctx| {
        if let Some(top) = ctx.stack.last() {
            meta.dependents.add(top);
            top.record_read(meta);
        }
    });
}

/// For each weak dependent, enqueue it if it is valid, not already
/// enqueued, and not on the eval stack.
pub(crate) fn enqueue_dependents(meta: &Meta) {
    meta.dependents.fold(|d| {
        with_ctx(|ctx| {
            if ctx.order.is_valid(d.start.get()) && !d.enqueued.get() && !d.onstack.get() {
                d.enqueued.set(true);
                ctx.queue.add(&ctx.order, d.clone());
                ctx.stats.incr_dirty();
            }
        });
    });
}

/// The invalidator installed on every node's `start_timestamp`. Must not
/// reach back into `EngineContext`: `TotalOrder::splice` runs invalidators
/// while already holding the context's exclusive borrow (it is itself
/// reached only via `ctx.order.splice(..)` inside a `with_ctx` closure), so
/// a `with_ctx` call here would double-borrow the thread-local `RefCell`.
/// The observer is therefore captured once at install time rather than
/// fetched from `ctx` when the invalidator fires.
fn make_invalidator(meta: Meta, observer: Rc<dyn CalcObserver>) -> impl FnMut() + 'static {
    move || {
        meta.dependents.clear();
        meta.clear_stale_reads();
        if let Some(mut cb) = meta.unmemo.borrow_mut().take() {
            cb();
        }
        *meta.evaluate.borrow_mut() = Some(Box::new(|| {}));
        meta.enqueued.set(false);
        observer.on_invalidate(meta.id);
    }
}

/// Allocate the start timestamp at the current cursor, push the stack
/// frame, run `body`, record the result, allocate the end timestamp, and
/// install the invalidator and `evaluate` closures.
pub(crate) fn make_and_eval_node<T: Data>(body: Rc<RefCell<dyn FnMut() -> T>>) -> Art<T> {
    let (start_ts, meta) = with_ctx(|ctx| {
        let start = ctx.order.add_next(ctx.eager_now);
        ctx.eager_now = start;
        ctx.stats.incr_create();
        (start, MetaInner::new_thunk(start))
    });

    let guard = StackGuard::enter(meta.clone());
    let value = (body.borrow_mut())();
    drop(guard);
    let value = T::sanitize(value);

    let node = Rc::new(NodeData {
        value: RefCell::new(value),
        meta: meta.clone(),
    });

    with_ctx(|ctx| {
        let end = ctx.order.add_next(ctx.eager_now);
        meta.end.set(end);
        ctx.eager_now = end;
        ctx.stats.incr_evaluate();
        let invalidator = make_invalidator(meta.clone(), ctx.observer.clone());
        ctx.order.set_invalidator(start_ts, invalidator);
    });

    install_evaluate_closure(meta, node.clone(), body);
    Art { node }
}

/// Builds the closure stored in `meta.evaluate`, used on every subsequent
/// re-run of this node (from `refresh_until`'s dequeue loop, or directly
/// from `memo_name`'s in-place-rewrite path). Captures `node` strongly:
/// the node keeps its own `evaluate` closure alive, a deliberate cycle
/// broken only by invalidation, matching the Lifecycle section's claim
/// that a node lives until its start_timestamp is spliced out.
fn install_evaluate_closure<T: Data>(
    meta: Meta,
    node: Rc<NodeData<T>>,
    body: Rc<RefCell<dyn FnMut() -> T>>,
) {
    let closure = move || {
        meta.clear_stale_reads();
        let guard = StackGuard::enter(meta.clone());
        let new_value = (body.borrow_mut())();
        drop(guard);
        let new_value = T::sanitize(new_value);

        let changed = !T::equal(&node.value.borrow(), &new_value);
        with_ctx(|ctx| ctx.stats.incr_evaluate());
        #[cfg(feature = "tracing")]
        tracing::trace!(node = node.meta.id, changed, "evaluate_meta");
        if changed {
            *node.value.borrow_mut() = new_value;
            enqueue_dependents(&node.meta);
        }
    };
    *node.meta.evaluate.borrow_mut() = Some(Box::new(closure));
}

/// Take a node's `evaluate` closure out, invoke it with no outstanding
/// `RefCell` borrow, and put it back — the pattern `MetaInner` documents
/// for its two self-referential closure fields. Used both by
/// `refresh_until`'s dequeue loop and by `memo_name`'s in-place rewrite.
pub(crate) fn run_evaluate(meta: &Meta) {
    let taken = meta.evaluate.borrow_mut().take();
    if let Some(mut cb) = taken {
        cb();
        let mut slot = meta.evaluate.borrow_mut();
        if slot.is_none() {
            *slot = Some(cb);
        }
    }
}

enum Action {
    Done,
    Stop,
    Evaluate(Meta, Timestamp),
}

/// Drain the priority queue in timestamp order, re-evaluating each stale
/// node inside its recorded interval.
pub(crate) fn refresh_until(end: Option<Timestamp>) {
    #[cfg(feature = "tracing")]
    tracing::trace!(bounded = end.is_some(), "refresh_until: start");

    loop {
        let action = with_ctx(|ctx| loop {
            let Some(top) = ctx.queue.top().cloned() else {
                return Action::Done;
            };
            if !ctx.order.is_valid(top.start.get()) {
                ctx.queue.pop(&ctx.order);
                continue;
            }
            if let Some(e) = end {
                if ctx.order.compare(top.end.get(), e) == std::cmp::Ordering::Greater {
                    return Action::Stop;
                }
            }
            let m = ctx.queue.pop(&ctx.order).expect("top() just confirmed non-empty");
            m.enqueued.set(false);
            let saved_finger = ctx.eager_finger;
            ctx.eager_now = m.start.get();
            ctx.eager_finger = m.end.get();
            return Action::Evaluate(m, saved_finger);
        });

        match action {
            Action::Done | Action::Stop => break,
            Action::Evaluate(m, saved_finger) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(node = m.id, "refresh_until: re-evaluating");
                run_evaluate(&m);
                with_ctx(|ctx| {
                    ctx.order.splice(ctx.eager_now, m.end.get());
                    ctx.eager_finger = saved_finger;
                    ctx.stats.incr_clean();
                });
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("refresh_until: done");
}

/// Propagate until the queue is empty, then reset the cursors to
/// `eager_start`.
pub fn refresh() {
    refresh_until(None);
    with_ctx(|ctx| {
        ctx.eager_now = ctx.eager_start;
        ctx.eager_finger = ctx.eager_start;
    });
}

/// Mutate a constant cell. Only legal on constant cells. Stores the new
/// value and enqueues dependents iff it differs from the old one.
pub(crate) fn set_cell<T: Data>(art: &Art<T>, new: T) {
    assert!(
        art.meta().is_constant(),
        "broken invariant: set is only legal on constant cells"
    );
    let new = T::sanitize(new);
    let changed = !T::equal(&art.node.value.borrow(), &new);
    #[cfg(feature = "tracing")]
    tracing::debug!(node = art.id(), changed, "set_cell");
    if changed {
        *art.node.value.borrow_mut() = new;
        with_ctx(|ctx| ctx.stats.incr_update());
        enqueue_dependents(art.meta());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Cell;

    fn reset_engine() {
        with_ctx(|ctx| *ctx = EngineContext::new());
    }

    fn make_cell(v: i64) -> Cell<i64> {
        let node = Rc::new(NodeData {
            value: RefCell::new(v),
            meta: MetaInner::new_constant(),
        });
        Cell::from_art(Art { node })
    }

    #[test]
    fn linear_chain_reevaluates_once_on_change() {
        reset_engine();
        let c = make_cell(1);
        let c_art = c.art();
        let body = Rc::new(RefCell::new(move || c_art.node.value.borrow().clone() + 1));
        let d = make_and_eval_node(body);
        assert_eq!(*d.node.value.borrow(), 2);

        set_cell(&c.art(), 10);
        refresh();
        assert_eq!(*d.node.value.borrow(), 11);

        let before = stats().evaluate;
        set_cell(&c.art(), 10);
        refresh();
        assert_eq!(stats().evaluate, before, "no-op set must not trigger re-evaluation");
    }

    #[test]
    fn reentrant_force_panics() {
        reset_engine();
        let meta = MetaInner::new_thunk(with_ctx(|ctx| ctx.order.add_next(ctx.eager_now)));
        let _g1 = StackGuard::enter(meta.clone());
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            StackGuard::enter(meta.clone())
        }));
        assert!(result.is_err());
    }
}

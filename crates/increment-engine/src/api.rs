//! The public Client Program surface.
//!
//! Everything a Client touches lives here: `const`/`cell`/`set`, `thunk`,
//! `mk_mfn`, `force`, `flush`, `refresh`. The implementation work (timestamp
//! allocation, propagation, memo lookup) lives in `engine.rs`/`memo.rs`; this
//! module is thin glue over them, re-exporting the subsystems behind a
//! handful of entry points.

use std::cell::RefCell;
use std::rc::Rc;

use crate::data::Data;
use crate::engine::{self, make_dependency_edge, with_ctx};
use crate::node::{Art, Cell, NodeData};

pub use crate::engine::{refresh, reset_with_config, set_observer, stats, CalcObserver, EngineConfig};
pub use crate::error::EngineError;
pub use crate::memo::{mk_mfn, MemoFn};
pub use crate::name::{Name, NoName, Symbol};
pub use crate::stats::StatsSnapshot;

/// A node with no interval: the constant-cell handle. Reading it never
/// enqueues anything; it can never itself be the target of `set`.
pub fn constant<T: Data>(v: T) -> Art<T> {
    let v = T::sanitize(v);
    with_ctx(|ctx| ctx.stats.incr_create());
    let node = Rc::new(NodeData {
        value: RefCell::new(v),
        meta: crate::node::MetaInner::new_constant(),
    });
    Art { node }
}

/// A named, mutable input cell. `name` is accepted for Client-side
/// diagnostics (`Data::show` friendliness); the engine itself keys nothing
/// off it, matching the unnamed `const` case it otherwise behaves
/// identically to.
pub fn cell<T: Data>(_name: &str, v: T) -> Cell<T> {
    Cell::from_art(constant(v))
}

/// Mutate a [`Cell`]. Only legal on constant cells, which is exactly what a
/// `Cell<T>` always wraps: there is no way to call `set` on a handle
/// produced by `thunk`/`mk_mfn`.
pub fn set<T: Data>(c: &Cell<T>, v: T) {
    engine::set_cell(&c.art(), v);
}

/// An ad-hoc, eagerly-evaluated, self re-evaluating node. `name` is
/// accepted for API parity/diagnostics only, as with [`cell`]; the thunk's
/// identity and reuse are governed entirely by the timestamp interval
/// `make_and_eval_node` allocates around `f`.
pub fn thunk<T: Data>(_name: &str, f: impl FnMut() -> T + 'static) -> Art<T> {
    let body: Rc<RefCell<dyn FnMut() -> T>> = Rc::new(RefCell::new(f));
    engine::make_and_eval_node(body)
}

/// Record a dependency edge from the currently-evaluating node (if any) to
/// `m`, then return `m`'s cached value.
pub fn force<T: Data>(m: &Art<T>) -> T {
    make_dependency_edge(m.meta());
    m.node.value.borrow().clone()
}

/// No-op: propagation in this engine is driven explicitly by [`refresh`],
/// never implicitly queued up behind a flush.
pub fn flush() {}

/// Discard every node, binding, and timestamp built so far and start a
/// fresh graph with the default [`EngineConfig`]. Not part of the Client
/// surface — ambient test tooling for isolating independent Client programs
/// that happen to share one thread (cargo's test harness reuses OS threads
/// across `#[test]` functions, and this engine's state is thread-local).
pub fn reset() {
    engine::reset_with_config(EngineConfig::default());
}

//! Nominal memo tables and `mk_mfn`'s `{data, art, nart}` triple.
//!
//! One [`MemoTable`] per memoized function, shared by its `Arg`-keyed
//! (`memo`) and `Name`-keyed (`memo_name`) lookups. An `Arg` key never
//! compares equal to a `Name` key, which is why both variants live in one
//! [`Key`] enum rather than two separate maps.

use std::cell::RefCell;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::data::Data;
use crate::engine::{self, with_ctx};
use crate::error::EngineError;
use crate::name::{splitmix64, Name};
use crate::node::{next_id, Art};

enum Key<A, N> {
    Arg(A),
    Name(N),
}

/// Wraps a [`Key`] with the table's per-instance seed so `Hash`/`Eq` can be
/// implemented without `A`/`N` themselves carrying a seed.
struct TableKey<A, N> {
    seed: u64,
    key: Key<A, N>,
}

impl<A: Data, N: Name> PartialEq for TableKey<A, N> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.key, &other.key) {
            (Key::Arg(a), Key::Arg(b)) => A::equal(a, b),
            (Key::Name(a), Key::Name(b)) => N::equal(a, b),
            _ => false,
        }
    }
}

impl<A: Data, N: Name> Eq for TableKey<A, N> {}

impl<A: Data, N: Name> Hash for TableKey<A, N> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let h = match &self.key {
            Key::Arg(a) => A::hash(self.seed, a),
            Key::Name(n) => N::hash(n) ^ self.seed,
        };
        h.hash(state);
    }
}

struct Entry<A, T> {
    arg_ref: Rc<RefCell<A>>,
    node: Art<T>,
}

impl<A, T> Clone for Entry<A, T> {
    fn clone(&self) -> Self {
        Entry {
            arg_ref: self.arg_ref.clone(),
            node: self.node.clone(),
        }
    }
}

struct BindingInner<A, T> {
    nodes: Vec<Entry<A, T>>,
}

/// A binding is held weakly by the table's map; each member node keeps it
/// alive strongly via its own `unmemo` closure.
type Binding<A, T> = Rc<RefCell<BindingInner<A, T>>>;

struct MemoTable<A, N, T> {
    seed: u64,
    bindings: RefCell<FxHashMap<TableKey<A, N>, Binding<A, T>>>,
}

impl<A: Data, N: Name, T: Data> MemoTable<A, N, T> {
    fn new() -> Self {
        MemoTable {
            seed: splitmix64(next_id()),
            bindings: RefCell::new(FxHashMap::default()),
        }
    }

    /// Look up `key`; install a fresh empty binding if absent. Returns the
    /// canonical (shared) binding either way.
    fn merge(&self, key: Key<A, N>) -> Binding<A, T> {
        let table_key = TableKey {
            seed: self.seed,
            key,
        };
        self.bindings
            .borrow_mut()
            .entry(table_key)
            .or_insert_with(|| Rc::new(RefCell::new(BindingInner { nodes: Vec::new() })))
            .clone()
    }
}

/// A memoized function: `data` is the plain recursive call, `art` is
/// `memo`, `nart` is `memo_name`.
pub struct MemoFn<A, N, T> {
    inner: Rc<MemoFnInner<A, N, T>>,
}

impl<A, N, T> Clone for MemoFn<A, N, T> {
    fn clone(&self) -> Self {
        MemoFn {
            inner: self.inner.clone(),
        }
    }
}

struct MemoFnInner<A, N, T> {
    tag: &'static str,
    table: MemoTable<A, N, T>,
    user_fn: Box<dyn Fn(&MemoFn<A, N, T>, &A) -> T>,
}

impl<A: Data, N: Name, T: Data> MemoFn<A, N, T> {
    /// The plain, non-memoized recursive call: runs `user_fn` directly,
    /// handing it `self` back so it can recurse via `.art`/`.nart`.
    pub fn data(&self, arg: &A) -> T {
        (self.inner.user_fn)(self, arg)
    }

    /// Anonymous memoization, keyed by `arg`.
    pub fn art(&self, arg: A) -> Art<T> {
        memo(self, arg)
    }

    /// Nominal memoization, keyed by `name`. Panics if `N::SUPPORTS_NOMINAL`
    /// is `false`.
    pub fn nart(&self, name: N, arg: A) -> Art<T> {
        memo_name(self, name, arg)
    }
}

/// Build a memoized function from a plain recursive `user_fn`, tagged with
/// `tag` for diagnostics.
pub fn mk_mfn<A, N, T>(
    tag: &'static str,
    user_fn: impl Fn(&MemoFn<A, N, T>, &A) -> T + 'static,
) -> MemoFn<A, N, T>
where
    A: Data,
    N: Name,
    T: Data,
{
    MemoFn {
        inner: Rc::new(MemoFnInner {
            tag,
            table: MemoTable::new(),
            user_fn: Box::new(user_fn),
        }),
    }
}

/// Whether a memo-table hit candidate can be reused: its interval must lie
/// strictly ahead of the caller's cursor and strictly inside the caller's
/// window.
fn is_available(meta: &crate::node::Meta) -> bool {
    with_ctx(|ctx| {
        let start = meta.start.get();
        ctx.order.is_valid(start)
            && ctx.order.compare(start, ctx.eager_now) == std::cmp::Ordering::Greater
            && ctx.order.compare(meta.end.get(), ctx.eager_finger) == std::cmp::Ordering::Less
    })
}

/// Splice out the skipped-over gap, bring the reused subgraph up to date,
/// and advance the cursor past it. Shared by `memo`'s hit path and
/// `memo_name`'s same-arg hit path.
fn reuse_available<T: Data>(node: &Art<T>) {
    let node_start = node.meta().start.get();
    let node_end = node.meta().end.get();
    with_ctx(|ctx| {
        ctx.order.splice(ctx.eager_now, node_start);
        ctx.eager_now = node_start;
    });
    engine::refresh_until(Some(node_end));
    with_ctx(|ctx| ctx.eager_now = node_end);
}

fn do_fresh_binding<A: Data, N: Name, T: Data>(
    mf: &MemoFn<A, N, T>,
    binding: Binding<A, T>,
    arg: A,
) -> Art<T> {
    let arg_ref = Rc::new(RefCell::new(arg));
    let mf_for_body = mf.clone();
    let arg_ref_for_body = arg_ref.clone();
    let body: Rc<RefCell<dyn FnMut() -> T>> = Rc::new(RefCell::new(move || {
        let arg = arg_ref_for_body.borrow();
        (mf_for_body.inner.user_fn)(&mf_for_body, &arg)
    }));

    let node = engine::make_and_eval_node(body);

    let binding_for_unmemo = binding.clone();
    let node_id = node.id();
    *node.meta().unmemo.borrow_mut() = Some(Box::new(move || {
        binding_for_unmemo
            .borrow_mut()
            .nodes
            .retain(|e| e.node.id() != node_id);
    }));

    binding.borrow_mut().nodes.push(Entry {
        arg_ref,
        node: node.clone(),
    });

    engine::make_dependency_edge(node.meta());
    node
}

/// Anonymous (arg-keyed) memoization: reuse the cached node for `arg` if
/// one is available, otherwise build a fresh binding.
fn memo<A: Data, N: Name, T: Data>(mf: &MemoFn<A, N, T>, arg: A) -> Art<T> {
    let binding = mf.inner.table.merge(Key::Arg(arg.clone()));
    let found = {
        let nodes = binding.borrow().nodes.clone();
        nodes.into_iter().find(|e| is_available(e.node.meta()))
    };
    match found {
        Some(entry) => {
            reuse_available(&entry.node);
            with_ctx(|ctx| ctx.stats.incr_hit());
            #[cfg(feature = "tracing")]
            tracing::trace!(tag = mf.inner.tag, node = entry.node.id(), "memo: hit");
            engine::make_dependency_edge(entry.node.meta());
            entry.node
        }
        None => {
            with_ctx(|ctx| ctx.stats.incr_miss());
            #[cfg(feature = "tracing")]
            tracing::trace!(tag = mf.inner.tag, "memo: miss");
            do_fresh_binding(mf, binding, arg)
        }
    }
}

/// Nominal (name-keyed) memoization: reuse the node bound to `name` if it is
/// available, re-running it in place if `arg` changed since last time.
fn memo_name<A: Data, N: Name, T: Data>(mf: &MemoFn<A, N, T>, name: N, arg: A) -> Art<T> {
    if !N::SUPPORTS_NOMINAL {
        EngineError::MissingNominalSupport { tag: mf.inner.tag }.panic_with();
    }

    let binding = mf.inner.table.merge(Key::Name(name));
    let found = {
        let nodes = binding.borrow().nodes.clone();
        nodes.into_iter().find(|e| is_available(e.node.meta()))
    };

    match found {
        None => {
            with_ctx(|ctx| ctx.stats.incr_miss());
            #[cfg(feature = "tracing")]
            tracing::trace!(tag = mf.inner.tag, "memo_name: miss");
            do_fresh_binding(mf, binding, arg)
        }
        Some(entry) => {
            with_ctx(|ctx| ctx.stats.incr_hit());
            let same_arg = A::equal(&entry.arg_ref.borrow(), &arg);
            #[cfg(feature = "tracing")]
            tracing::trace!(
                tag = mf.inner.tag,
                node = entry.node.id(),
                same_arg,
                "memo_name: hit"
            );
            if same_arg {
                reuse_available(&entry.node);
                engine::make_dependency_edge(entry.node.meta());
                entry.node
            } else {
                *entry.arg_ref.borrow_mut() = arg;
                in_place_reeval(&entry.node);
                engine::make_dependency_edge(entry.node.meta());
                entry.node
            }
        }
    }
}

/// `memo_name`'s "arg differs" path: re-run the node's body in place
/// inside its existing interval instead of adopting the old value.
fn in_place_reeval<T: Data>(node: &Art<T>) {
    let meta = node.meta().clone();
    let start = meta.start.get();
    let end = meta.end.get();

    let saved_finger = with_ctx(|ctx| {
        let saved = ctx.eager_finger;
        ctx.order.splice(ctx.eager_now, start);
        ctx.eager_now = start;
        ctx.eager_finger = end;
        saved
    });

    engine::run_evaluate(&meta);

    with_ctx(|ctx| {
        ctx.order.splice(ctx.eager_now, end);
        ctx.eager_finger = saved_finger;
        ctx.eager_now = end;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{refresh, EngineContext};
    use crate::name::Symbol;
    use crate::node::Cell;

    fn reset_engine() {
        with_ctx(|ctx| *ctx = EngineContext::new());
    }

    fn make_cell(v: i64) -> Cell<i64> {
        let node = Rc::new(crate::node::NodeData {
            value: RefCell::new(v),
            meta: crate::node::MetaInner::new_constant(),
        });
        Cell::from_art(Art { node })
    }

    #[test]
    fn anonymous_memo_reuses_by_arg() {
        reset_engine();
        let mf: MemoFn<i64, (), i64> = mk_mfn("double", |_mf, a| a * 2);
        let a1 = mf.art(3);
        let a2 = mf.art(3);
        assert_eq!(a1.id(), a2.id(), "same arg must reuse the same node");
    }

    #[test]
    fn name_reuse_with_different_arg_increments_evaluate_once() {
        reset_engine();
        let mf: MemoFn<i64, Symbol, i64> = mk_mfn("succ", |_mf, a| a + 1);

        let outer_c = make_cell(1);
        let outer_c_art = outer_c.art();
        let mf_for_outer = mf.clone();
        let name = Symbol::gensym("k");
        let name_for_body = name;
        let outer_body = Rc::new(RefCell::new(move || {
            let x = *outer_c_art.node.value.borrow();
            let inner = mf_for_outer.nart(name_for_body, if x < 5 { 3 } else { 7 });
            *inner.node.value.borrow()
        }));
        let t = engine::make_and_eval_node(outer_body);
        assert_eq!(*t.node.value.borrow(), 4);

        let before = crate::engine::stats().evaluate;
        crate::engine::set_cell(&outer_c.art(), 10);
        refresh();
        assert_eq!(*t.node.value.borrow(), 8);
        assert_eq!(crate::engine::stats().evaluate - before, 2, "outer thunk and inner nart node each evaluate exactly once");
    }
}

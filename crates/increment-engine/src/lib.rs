//! `increment-engine` — an incremental (self-adjusting) computation
//! runtime: memoized computations keyed by name and argument, a dynamic
//! dependency graph between computations and mutable inputs, and change
//! propagation that re-executes only the affected subgraph in a provably
//! correct order after a mutation.
//!
//! # Layout
//!
//! - `order` — Component A, the order-maintenance timestamp service.
//! - `pqueue` — Component B, the start-timestamp-ordered priority queue.
//! - `node` — Components C & D, the weak dependent set and the Node/Meta
//!   pair.
//! - `engine` — Component E, change propagation, plus the process-wide
//!   engine context.
//! - `memo` — Component F, nominal memo tables and `mk_mfn`.
//! - [`api`] — Component G, the public Client Program surface.
//! - [`data`]/[`name`] — the `Data`/`Name` capability contracts a Client
//!   supplies per value/name type.
//!
//! # Concurrency
//!
//! Strictly single-threaded cooperative: every operation mutates a
//! thread-local engine context. There is no locking and no `Send`/`Sync` on
//! any public handle; sharing a graph across threads is not supported.
//!
//! # Example
//!
//! ```
//! use increment_engine::{cell, force, mk_mfn, refresh, set, thunk, NoName};
//!
//! let c = cell("c", 1i64);
//! let mf = mk_mfn::<i64, NoName, i64>("succ", |_mf, a| a + 1);
//! let c_for_body = c.art();
//! let mf_for_body = mf.clone();
//! let d = thunk("d", move || force(&mf_for_body.art(force(&c_for_body))));
//! assert_eq!(force(&d), 2);
//!
//! set(&c, 10);
//! refresh();
//! assert_eq!(force(&d), 11);
//! ```

pub mod api;
pub mod data;
pub mod engine;
pub mod memo;
pub mod name;
pub mod node;
pub mod order;
pub mod stats;

mod error;
mod pqueue;

pub use api::{
    cell, constant, flush, force, mk_mfn, refresh, reset, reset_with_config, set, set_observer,
    stats, thunk,
};
pub use data::Data;
pub use engine::{CalcObserver, EngineConfig};
pub use error::EngineError;
pub use memo::MemoFn;
pub use name::{Name, NoName, Symbol};
pub use node::{Art, Cell};
pub use stats::StatsSnapshot;

//! Monotonic engine counters.
//!
//! Plain `Cell<u64>` rather than atomics: the engine is strictly
//! single-threaded (see the crate's concurrency note in `lib.rs`), so there
//! is nothing to synchronize.

use std::cell::Cell;

/// A read-only snapshot of [`Stats`], safe to move around or assert on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub create: u64,
    pub evaluate: u64,
    pub hit: u64,
    pub miss: u64,
    pub dirty: u64,
    pub clean: u64,
    pub update: u64,
}

/// Monotonic counters tracking engine activity, exposed read-only to the
/// Client.
#[derive(Default)]
pub struct Stats {
    create: Cell<u64>,
    evaluate: Cell<u64>,
    hit: Cell<u64>,
    miss: Cell<u64>,
    dirty: Cell<u64>,
    clean: Cell<u64>,
    update: Cell<u64>,
}

macro_rules! counter_accessors {
    ($($field:ident => $inc:ident),+ $(,)?) => {
        $(
            pub(crate) fn $inc(&self) {
                self.$field.set(self.$field.get() + 1);
            }

            pub fn $field(&self) -> u64 {
                self.$field.get()
            }
        )+
    };
}

impl Stats {
    counter_accessors! {
        create => incr_create,
        evaluate => incr_evaluate,
        hit => incr_hit,
        miss => incr_miss,
        dirty => incr_dirty,
        clean => incr_clean,
        update => incr_update,
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            create: self.create(),
            evaluate: self.evaluate(),
            hit: self.hit(),
            miss: self.miss(),
            dirty: self.dirty(),
            clean: self.clean(),
            update: self.update(),
        }
    }

    pub fn reset(&self) {
        self.create.set(0);
        self.evaluate.set(0);
        self.hit.set(0);
        self.miss.set(0);
        self.dirty.set(0);
        self.clean.set(0);
        self.update.set(0);
    }
}

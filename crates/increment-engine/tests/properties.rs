//! Property tests against the public Client surface.
//!
//! Each case resets the process-wide engine (`increment_engine::reset`)
//! before building its graph: proptest runs many cases through one `#[test]`
//! function body on a single thread, and this engine's state is
//! thread-local, so independent cases would otherwise bleed into each
//! other's statistics and timestamps.

use std::cell::RefCell;
use std::rc::Rc;

use increment_engine::{cell, force, reset, set, thunk};
use proptest::prelude::*;

/// P1: forcing a node built only from `cell`/`thunk`/`force` equals a
/// from-scratch recomputation over the current cell values.
#[test]
fn p1_equivalence_to_from_scratch_recomputation() {
    proptest!(|(a in -1000i64..1000, b in -1000i64..1000, updates in prop::collection::vec((-1000i64..1000, -1000i64..1000), 0..8))| {
        reset();

        let ca = cell("a", a);
        let cb = cell("b", b);
        let ca_for_d1 = ca.art();
        let d1 = thunk("d1", move || force(&ca_for_d1) * 2);
        let cb_for_d2 = cb.art();
        let d2 = thunk("d2", move || force(&cb_for_d2) + 3);
        let d1_for_e = d1.clone();
        let d2_for_e = d2.clone();
        let e = thunk("e", move || force(&d1_for_e) - force(&d2_for_e));

        let mut cur_a = a;
        let mut cur_b = b;
        prop_assert_eq!(force(&e), cur_a * 2 - (cur_b + 3));

        for (na, nb) in updates {
            set(&ca, na);
            set(&cb, nb);
            increment_engine::refresh();
            cur_a = na;
            cur_b = nb;
            prop_assert_eq!(force(&e), cur_a * 2 - (cur_b + 3));
        }
    });
}

/// P6: setting a cell to a value equal (by `Data::equal`) to its current
/// one must not enqueue any dependent — observable here as no change in the
/// `evaluate` counter across the no-op `set`/`refresh`.
#[test]
fn p6_no_op_set_never_triggers_reevaluation() {
    proptest!(|(v in -1000i64..1000)| {
        reset();
        let c = cell("c", v);
        let c_for_body = c.art();
        let d = thunk("d", move || force(&c_for_body) + 1);
        force(&d);

        let before = increment_engine::stats().evaluate;
        set(&c, v);
        increment_engine::refresh();
        prop_assert_eq!(increment_engine::stats().evaluate, before);
    });
}

/// P2: during a `refresh`, nodes are re-evaluated in ascending
/// start-timestamp order — approximated here as "topologically before their
/// dependents," which for a simple linear pipeline collapses to "in the
/// order the pipeline was originally built," observed through eval-order
/// instrumentation on an `Rc<RefCell<Vec<&str>>>` log rather than the
/// (crate-private) timestamp type itself.
#[test]
fn p2_reevaluation_follows_ascending_pipeline_order() {
    proptest!(|(seed in -1000i64..1000, bumps in 1usize..6)| {
        reset();
        let log = Rc::new(RefCell::new(Vec::<&'static str>::new()));

        let c = cell("c", seed);
        let c_for_d1 = c.art();
        let log1 = log.clone();
        let d1 = thunk("stage1", move || {
            log1.borrow_mut().push("stage1");
            force(&c_for_d1) + 1
        });
        let d1_for_d2 = d1.clone();
        let log2 = log.clone();
        let d2 = thunk("stage2", move || {
            log2.borrow_mut().push("stage2");
            force(&d1_for_d2) * 2
        });
        let d2_for_d3 = d2.clone();
        let log3 = log.clone();
        let d3 = thunk("stage3", move || {
            log3.borrow_mut().push("stage3");
            force(&d2_for_d3) - 1
        });
        force(&d3);
        log.borrow_mut().clear();

        for i in 0..bumps {
            set(&c, seed + i as i64 + 1);
            increment_engine::refresh();
            let order = log.borrow().clone();
            prop_assert_eq!(&order, &vec!["stage1", "stage2", "stage3"]);
            log.borrow_mut().clear();
        }
    });
}

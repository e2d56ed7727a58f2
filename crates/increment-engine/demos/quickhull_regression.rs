//! Client Program demo: a convex hull recomputed incrementally after
//! perturbing a single point, using only the public engine surface
//! (`cell`/`mk_mfn`/`force`/`refresh`). This is NOT a convex hull library —
//! it is the minimal Client code needed to exercise the runtime's
//! memoized-recursion path the way a real geometry library built on top of
//! it would; such libraries live outside this crate.
//!
//! The point set is split by index into a balanced binary recursion
//! (`hull_range(lo, hi)`, nominally memoized by the `(lo, hi)` range), each
//! leaf forcing exactly the point cells in its slice and each internal
//! range merging its two children's hull vertices via
//! `hull(A ∪ B) == hull(hull(A) ∪ hull(B))`. Perturbing one point enqueues
//! only the leaf that reads it; propagation then climbs exactly the
//! O(log N) ancestor ranges whose merged hull actually changes.

use increment_engine::{cell, force, mk_mfn, refresh, set, stats, Art, Cell, Data, MemoFn, Symbol};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
struct Point {
    x: i64,
    y: i64,
}

impl Data for Point {
    fn equal(a: &Self, b: &Self) -> bool {
        a == b
    }

    fn hash(seed: u64, a: &Self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = rustc_hash::FxHasher::default();
        seed.hash(&mut hasher);
        a.hash(&mut hasher);
        hasher.finish()
    }

    fn show(a: &Self) -> String {
        format!("({}, {})", a.x, a.y)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Range {
    lo: u32,
    hi: u32,
}

impl Data for Range {
    fn equal(a: &Self, b: &Self) -> bool {
        a == b
    }

    fn hash(seed: u64, a: &Self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = rustc_hash::FxHasher::default();
        seed.hash(&mut hasher);
        a.lo.hash(&mut hasher);
        a.hi.hash(&mut hasher);
        hasher.finish()
    }

    fn show(a: &Self) -> String {
        format!("[{}, {})", a.lo, a.hi)
    }
}

fn cross(o: Point, a: Point, b: Point) -> i64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Andrew's monotone chain. Used both for leaf ranges (over raw points) and
/// for merging two children's hull vertices, relying on
/// `hull(A ∪ B) == hull(hull(A) ∪ hull(B))` so the merge step never needs
/// to re-touch points outside the two child hulls.
fn monotone_hull(mut pts: Vec<Point>) -> Vec<Point> {
    pts.sort_by_key(|p| (p.x, p.y));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }
    let mut lower: Vec<Point> = Vec::new();
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<Point> = Vec::new();
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0 {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

fn hull_range(
    mf: &MemoFn<Range, Symbol, Vec<Point>>,
    points: &[Art<Point>],
    arg: &Range,
) -> Vec<Point> {
    if arg.hi - arg.lo <= 2 {
        let pts = (arg.lo..arg.hi).map(|i| force(&points[i as usize])).collect();
        return monotone_hull(pts);
    }
    let mid = arg.lo + (arg.hi - arg.lo) / 2;
    let left = mf.nart(
        Symbol::gensym(&format!("hull:{}:{}", arg.lo, mid)),
        Range { lo: arg.lo, hi: mid },
    );
    let right = mf.nart(
        Symbol::gensym(&format!("hull:{}:{}", mid, arg.hi)),
        Range { lo: mid, hi: arg.hi },
    );
    let mut merged = force(&left);
    merged.extend(force(&right));
    monotone_hull(merged)
}

fn main() {
    const N: usize = 4096;
    let mut rng = SmallRng::seed_from_u64(0xC0FFEE);
    let points: Vec<Cell<Point>> = (0..N)
        .map(|_| {
            let p = Point {
                x: rng.gen_range(-10_000..10_000),
                y: rng.gen_range(-10_000..10_000),
            };
            cell("point", p)
        })
        .collect();
    let point_arts: Vec<Art<Point>> = points.iter().map(|c| c.art()).collect();

    let mf = mk_mfn::<Range, Symbol, Vec<Point>>("hull_range", move |mf, arg| {
        hull_range(mf, &point_arts, arg)
    });

    let root_name = Symbol::gensym(&format!("hull:0:{N}"));
    let root = mf.nart(root_name, Range { lo: 0, hi: N as u32 });
    let baseline_hull = force(&root);
    let baseline_stats = stats();
    println!(
        "from-scratch pass: {} points, hull has {} vertices, {} nodes created, {} evaluations",
        N,
        baseline_hull.len(),
        baseline_stats.create,
        baseline_stats.evaluate
    );

    // Perturb one point far outside the current hull so the change is
    // guaranteed to propagate all the way to the root.
    let idx = N / 3;
    set(&points[idx], Point { x: 50_000, y: 50_000 });
    refresh();

    let after_evaluate = stats().evaluate - baseline_stats.evaluate;
    let new_hull = force(&root);
    println!(
        "after perturbing point {idx}: hull has {} vertices, {} incremental evaluations (vs. {N} for a from-scratch pass)",
        new_hull.len(),
        after_evaluate
    );
    assert!(new_hull.contains(&Point { x: 50_000, y: 50_000 }));
    assert!(
        (after_evaluate as usize) < N,
        "incremental re-hull touched more nodes than a from-scratch pass would have"
    );
}

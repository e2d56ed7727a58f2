//! Benchmarks for order maintenance and the quickhull-style
//! incremental-vs-from-scratch comparison.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use increment_engine::order::TotalOrder;
use increment_engine::{cell, force, mk_mfn, refresh, set, stats, Art, Cell, Data, MemoFn, Symbol};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

fn bench_add_next(c: &mut Criterion) {
    let mut group = c.benchmark_group("TotalOrder::add_next");
    for n in [1_000usize, 10_000, 100_000] {
        group.bench_with_input(BenchmarkId::new("sequential", n), &n, |b, &n| {
            b.iter(|| {
                let (mut to, root) = TotalOrder::create();
                let mut cursor = root;
                for _ in 0..n {
                    cursor = to.add_next(black_box(cursor));
                }
            });
        });
    }
    group.finish();
}

fn bench_compare(c: &mut Criterion) {
    let (mut to, root) = TotalOrder::create();
    let mut stamps = vec![root];
    let mut cursor = root;
    for _ in 0..10_000 {
        cursor = to.add_next(cursor);
        stamps.push(cursor);
    }
    c.bench_function("TotalOrder::compare/10k", |b| {
        b.iter(|| {
            for w in stamps.windows(2) {
                black_box(to.compare(w[0], w[1]));
            }
        });
    });
}

fn bench_splice(c: &mut Criterion) {
    let mut group = c.benchmark_group("TotalOrder::splice");
    for n in [1_000usize, 10_000] {
        group.bench_with_input(BenchmarkId::new("remove_half", n), &n, |b, &n| {
            b.iter_batched(
                || {
                    let (mut to, root) = TotalOrder::create();
                    let mut cursor = root;
                    let mut mid = root;
                    for i in 0..n {
                        cursor = to.add_next(cursor);
                        if i == n / 2 {
                            mid = cursor;
                        }
                    }
                    (to, root, mid, cursor)
                },
                |(mut to, root, mid, last)| {
                    to.splice(black_box(root), black_box(mid));
                    black_box(&to.is_valid(last));
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

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

fn hull_range(mf: &MemoFn<Range, Symbol, Vec<Point>>, points: &[Art<Point>], arg: &Range) -> Vec<Point> {
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

/// One perturbation on a 10,000-point set should cost far fewer evaluations
/// than a from-scratch pass over the whole set.
fn bench_quickhull_regression(c: &mut Criterion) {
    const N: usize = 10_000;
    c.bench_function("quickhull_regression/incremental_reperturb", |b| {
        b.iter_batched(
            || {
                increment_engine::reset();
                let mut rng = SmallRng::seed_from_u64(7);
                let points: Vec<Cell<Point>> = (0..N)
                    .map(|_| {
                        cell(
                            "point",
                            Point {
                                x: rng.gen_range(-10_000..10_000),
                                y: rng.gen_range(-10_000..10_000),
                            },
                        )
                    })
                    .collect();
                let point_arts: Vec<Art<Point>> = points.iter().map(|c| c.art()).collect();
                let mf = mk_mfn::<Range, Symbol, Vec<Point>>("hull_range", move |mf, arg| {
                    hull_range(mf, &point_arts, arg)
                });
                let root = mf.nart(
                    Symbol::gensym(&format!("hull:0:{N}")),
                    Range { lo: 0, hi: N as u32 },
                );
                force(&root);
                (points, root)
            },
            |(points, root)| {
                set(&points[N / 2], Point { x: 50_000, y: 50_000 });
                refresh();
                black_box(force(&root));
                black_box(stats().evaluate);
            },
            criterion::BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, bench_add_next, bench_compare, bench_splice, bench_quickhull_regression);
criterion_main!(benches);

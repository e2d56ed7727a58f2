//! The `Name` capability the Client supplies for nominal memoization.

use std::cell::Cell as StdCell;
use std::hash::{Hash, Hasher};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::error::EngineError;

/// Deterministic name splitting/combination, plus fresh-name allocation, for
/// backends that support nominal memoization (`mk_mfn().nart`).
pub trait Name: Clone + 'static {
    /// Whether this backend supports `nart` at all. `false` makes every
    /// `nart` call on functions built over this `Name` panic with
    /// [`EngineError::MissingNominalSupport`].
    const SUPPORTS_NOMINAL: bool = true;

    fn equal(a: &Self, b: &Self) -> bool;
    fn hash(a: &Self) -> u64;

    /// Deterministic 2-way split: same input always yields the same pair,
    /// and the two outputs are distinct from each other and from `n`.
    fn fork(n: &Self) -> (Self, Self);
    fn pair(n: &Self, m: &Self) -> Self;
    fn gensym(s: &str) -> Self;
    fn nondet() -> Self;
}

pub(crate) fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// A nominal name backed by a single 64-bit path hash, in the style of
/// Adapton's hash-consed names: `fork`/`pair`/`gensym` are pure mixing
/// functions over that hash so that two runs of the same Client program
/// produce the same names (required for memo reuse across re-execution).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(u64);

impl Symbol {
    pub fn new(seed: u64) -> Self {
        Symbol(splitmix64(seed))
    }
}

impl Name for Symbol {
    fn equal(a: &Self, b: &Self) -> bool {
        a == b
    }

    fn hash(a: &Self) -> u64 {
        a.0
    }

    fn fork(n: &Self) -> (Self, Self) {
        (
            Symbol(splitmix64(n.0 ^ 0x1111_1111_1111_1111)),
            Symbol(splitmix64(n.0 ^ 0x2222_2222_2222_2222)),
        )
    }

    fn pair(n: &Self, m: &Self) -> Self {
        Symbol(splitmix64(n.0 ^ m.0.rotate_left(17)))
    }

    fn gensym(s: &str) -> Self {
        let mut hasher = rustc_hash::FxHasher::default();
        s.hash(&mut hasher);
        Symbol(splitmix64(hasher.finish()))
    }

    fn nondet() -> Self {
        // No ambient entropy source is assumed (the engine targets portable
        // wasm guests too, per the crate's `rand`/small_rng-only posture):
        // seed a small PRNG from the process-unique id counter instead of
        // `from_entropy`, which would pull in `getrandom`.
        thread_local! {
            static RNG: StdCell<Option<SmallRng>> = const { StdCell::new(None) };
        }
        RNG.with(|cell| {
            let mut rng = cell
                .take()
                .unwrap_or_else(|| SmallRng::seed_from_u64(crate::node::next_id()));
            let v: u64 = rng.gen();
            cell.set(Some(rng));
            Symbol(splitmix64(v))
        })
    }
}

/// A backend for clients that never use nominal memoization. Every
/// name-producing operation is a fatal programmer error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoName;

impl Name for NoName {
    const SUPPORTS_NOMINAL: bool = false;

    fn equal(_: &Self, _: &Self) -> bool {
        true
    }

    fn hash(_: &Self) -> u64 {
        0
    }

    fn fork(_: &Self) -> (Self, Self) {
        EngineError::MissingNominalSupport { tag: "NoName::fork" }.panic_with()
    }

    fn pair(_: &Self, _: &Self) -> Self {
        EngineError::MissingNominalSupport { tag: "NoName::pair" }.panic_with()
    }

    fn gensym(_: &str) -> Self {
        EngineError::MissingNominalSupport { tag: "NoName::gensym" }.panic_with()
    }

    fn nondet() -> Self {
        EngineError::MissingNominalSupport { tag: "NoName::nondet" }.panic_with()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fork_is_deterministic_and_distinct() {
        let n = Symbol::gensym("root");
        let (a1, b1) = Symbol::fork(&n);
        let (a2, b2) = Symbol::fork(&n);
        assert!(Symbol::equal(&a1, &a2));
        assert!(Symbol::equal(&b1, &b2));
        assert!(!Symbol::equal(&a1, &b1));
        assert!(!Symbol::equal(&a1, &n));
    }

    #[test]
    fn gensym_is_reproducible() {
        let a = Symbol::gensym("k");
        let b = Symbol::gensym("k");
        assert!(Symbol::equal(&a, &b));
        let c = Symbol::gensym("k2");
        assert!(!Symbol::equal(&a, &c));
    }

    #[test]
    #[should_panic(expected = "nominal")]
    fn noname_fork_panics() {
        let _ = NoName::fork(&NoName);
    }
}

//! The `Data` capability the Client supplies per value type.

/// Equality, hashing, display, and normalization for a value type flowing
/// through the engine. `equal` drives change detection, both for a node's
/// own re-evaluation and for the cell-update check; `hash` drives memo
/// table bucketing with a per-table seed; `show`/`sanitize` are
/// debugging/normalization hooks.
pub trait Data: Clone + 'static {
    fn equal(a: &Self, b: &Self) -> bool;
    fn hash(seed: u64, a: &Self) -> u64;
    fn show(a: &Self) -> String;

    /// Normalize a value before it is stored (e.g. canonicalizing NaN).
    /// Default is the identity.
    fn sanitize(a: Self) -> Self {
        a
    }
}

macro_rules! impl_data_via_hash_eq {
    ($($t:ty),+ $(,)?) => {
        $(
            impl Data for $t {
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
                    format!("{a:?}")
                }
            }
        )+
    };
}

impl_data_via_hash_eq!(bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, String);

impl Data for () {
    fn equal(_: &Self, _: &Self) -> bool {
        true
    }

    fn hash(seed: u64, _: &Self) -> u64 {
        seed
    }

    fn show(_: &Self) -> String {
        "()".to_string()
    }
}

impl Data for f64 {
    fn equal(a: &Self, b: &Self) -> bool {
        // Bitwise equality so that two NaNs compare equal to themselves
        // consistently (required: `equal` must be reflexive for memoization
        // to terminate), unlike IEEE `==`.
        a.to_bits() == b.to_bits()
    }

    fn hash(seed: u64, a: &Self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = rustc_hash::FxHasher::default();
        seed.hash(&mut hasher);
        a.to_bits().hash(&mut hasher);
        hasher.finish()
    }

    fn show(a: &Self) -> String {
        format!("{a}")
    }
}

impl<T: Data> Data for Vec<T> {
    fn equal(a: &Self, b: &Self) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| T::equal(x, y))
    }

    fn hash(seed: u64, a: &Self) -> u64 {
        a.iter().fold(seed, |acc, x| T::hash(acc, x))
    }

    fn show(a: &Self) -> String {
        let parts: Vec<String> = a.iter().map(T::show).collect();
        format!("[{}]", parts.join(", "))
    }

    fn sanitize(a: Self) -> Self {
        a.into_iter().map(T::sanitize).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_equals_itself_bitwise() {
        let nan = f64::NAN;
        assert!(Data::equal(&nan, &nan));
    }

    #[test]
    fn vec_data_compares_elementwise() {
        assert!(Data::equal(&vec![1i64, 2, 3], &vec![1i64, 2, 3]));
        assert!(!Data::equal(&vec![1i64, 2, 3], &vec![1i64, 2]));
    }

    #[test]
    fn hash_changes_with_seed() {
        let a = 42i64;
        assert_ne!(Data::hash(1, &a), Data::hash(2, &a));
    }
}

//! Engine-level error type.
//!
//! Most failure modes in this crate are not `Result`-bearing: PQ-empty is
//! absorbed internally (`PriorityQueue::pop` returns `Option`), user-function
//! failures are ordinary Rust panics that unwind through the engine, and
//! broken invariants panic via `assert!`/`unreachable!` at the point they are
//! detected. `EngineError` exists for the handful of fatal programmer errors
//! that are worth a named type even though they are still raised via
//! `panic!` rather than returned.

/// Fatal, non-recoverable conditions raised as programmer errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// A `Name` implementation that does not support nominal memoization
    /// (`NameModule::SUPPORTS_NOMINAL == false`) was passed to
    /// [`crate::api::MemoFn::nart`].
    #[error("{tag}: backend name module does not support nominal memoization (nart)")]
    MissingNominalSupport { tag: &'static str },

    /// A node was forced while it was already on the evaluation stack
    /// (direct or indirect self-force during its own evaluation).
    #[error("reentrant force of node {id} during its own evaluation")]
    ReentrantForce { id: u64 },
}

impl EngineError {
    pub(crate) fn panic_with(self) -> ! {
        panic!("{self}");
    }
}

//! Store context for the loaded runtime.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// Per-runtime execution context stored in Wasmtime's Store.
///
/// Counts every call dispatched into a definition, including calls that
/// trap. Interior mutability lets the count be bumped through `store.data()`.
pub struct AddrunCtx {
    calls: AtomicU64,
}

impl AddrunCtx {
    /// Creates a new context with no calls recorded.
    pub fn new() -> Self {
        Self {
            calls: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of calls dispatched so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Default for AddrunCtx {
    fn default() -> Self {
        Self::new()
    }
}

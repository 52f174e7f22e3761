//! Runtime internals: the execution DAG, the executor, and the
//! runtime-scoped registries that queues orchestrate.

pub mod hints;
pub mod node;
pub mod registry;
pub mod runtime;
pub mod submitted_ops;

pub(crate) mod executor;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, tolerating poisoning: a panicked executor task must
/// not take the bookkeeping of unrelated submissions down with it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

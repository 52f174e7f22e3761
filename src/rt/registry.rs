//! Runtime-wide registry of captured asynchronous errors.

use std::sync::Mutex;

use tracing::debug;

use crate::core::errors::OffloadError;
use crate::rt::lock;

/// Errors captured by the executor sit here until an explicit throw or
/// a `wait_and_throw` drains them to an async handler.
///
/// The count snapshot plus iteration surface is what the fallback
/// submission path consumes to decide whether a kernel failed.
pub struct ErrorRegistry {
    errors: Mutex<Vec<OffloadError>>,
}

impl ErrorRegistry {
    pub(crate) fn new() -> Self {
        Self {
            errors: Mutex::new(Vec::new()),
        }
    }

    /// Number of errors currently queued.
    pub fn num_errors(&self) -> usize {
        lock(&self.errors).len()
    }

    /// Record a captured error.
    pub fn report(&self, error: OffloadError) {
        debug!(category = error.category(), %error, "captured runtime error");
        lock(&self.errors).push(error);
    }

    /// Visit every queued error without consuming it.
    pub fn for_each_error<F>(&self, mut f: F)
    where
        F: FnMut(&OffloadError),
    {
        for error in lock(&self.errors).iter() {
            f(error);
        }
    }

    /// Remove and return every queued error.
    pub fn drain(&self) -> Vec<OffloadError> {
        std::mem::take(&mut *lock(&self.errors))
    }
}

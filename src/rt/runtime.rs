//! The process-wide runtime singleton.

use std::sync::Arc;

use lazy_static::lazy_static;
use serde_json::json;

use crate::rt::executor::Executor;
use crate::rt::registry::ErrorRegistry;
use crate::rt::submitted_ops::SubmittedOps;

lazy_static! {
    static ref RUNTIME: Runtime = Runtime::new();
}

/// Access the process-wide runtime. Created lazily on first use and
/// alive for the rest of the process.
pub fn runtime() -> &'static Runtime {
    &RUNTIME
}

/// Owner of the executor, the error registry and the submitted-ops
/// tracker. Queues are thin orchestrators over this shared state.
pub struct Runtime {
    executor: Executor,
    errors: Arc<ErrorRegistry>,
    submitted_ops: SubmittedOps,
}

impl Runtime {
    fn new() -> Self {
        let errors = Arc::new(ErrorRegistry::new());
        Self {
            executor: Executor::new(Arc::clone(&errors)),
            errors,
            submitted_ops: SubmittedOps::new(),
        }
    }

    pub fn errors(&self) -> &ErrorRegistry {
        &self.errors
    }

    pub fn submitted_ops(&self) -> &SubmittedOps {
        &self.submitted_ops
    }

    pub(crate) fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Block until every operation submitted so far has completed,
    /// surfacing any asynchronous errors into the registry.
    pub fn flush_sync(&self) {
        self.executor.flush_sync();
    }

    /// Global flush followed by a wait on every tracked operation.
    pub fn wait(&self) {
        self.flush_sync();
        self.submitted_ops.wait_for_all();
    }

    /// Point-in-time status snapshot for diagnostics.
    pub fn diagnostics(&self) -> serde_json::Value {
        json!({
            "in_flight": self.executor.in_flight(),
            "tracked_operations": self.submitted_ops.len(),
            "pending_errors": self.errors.num_errors(),
        })
    }
}

//! The node executor.
//!
//! Submission is eager: a node is marked Submitted and its task spawned
//! immediately. Tasks await their requirement edges through each node's
//! completion channel, run the operation body on the blocking pool, and
//! signal completion to both blocking and async waiters. A global
//! in-flight counter backs `flush_sync`.

use std::sync::{Arc, Condvar, Mutex, PoisonError, Weak};

use dashmap::DashMap;
use tracing::trace;

use crate::core::errors::OffloadError;
use crate::rt::lock;
use crate::rt::node::{DagNode, ResourceId};
use crate::rt::registry::ErrorRegistry;

/// Counter of nodes submitted but not yet complete.
struct Inflight {
    count: Mutex<usize>,
    drained: Condvar,
}

impl Inflight {
    fn new() -> Self {
        Self {
            count: Mutex::new(0),
            drained: Condvar::new(),
        }
    }

    fn increment(&self) {
        *lock(&self.count) += 1;
    }

    fn decrement(&self) {
        let mut count = lock(&self.count);
        *count -= 1;
        if *count == 0 {
            self.drained.notify_all();
        }
    }

    fn wait_for_drain(&self) {
        let mut count = lock(&self.count);
        while *count != 0 {
            count = self
                .drained
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn current(&self) -> usize {
        *lock(&self.count)
    }
}

pub(crate) struct Executor {
    rt: tokio::runtime::Runtime,
    inflight: Arc<Inflight>,
    /// Last node to use each deferred resource; consulted to serialize
    /// operations that declare the same placeholder requirement.
    resource_users: DashMap<ResourceId, Weak<DagNode>>,
    errors: Arc<ErrorRegistry>,
}

impl Executor {
    pub(crate) fn new(errors: Arc<ErrorRegistry>) -> Self {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .thread_name("offload-executor")
            .build()
            .expect("failed to start executor runtime");
        Self {
            rt,
            inflight: Arc::new(Inflight::new()),
            resource_users: DashMap::new(),
            errors,
        }
    }

    /// Submit a node: resolve resource-serialization edges, mark it
    /// Submitted, and spawn its execution task.
    pub(crate) fn submit(&self, node: &Arc<DagNode>) {
        for resource in node.resources() {
            if let Some(previous) = self
                .resource_users
                .get(resource)
                .and_then(|user| user.value().upgrade())
            {
                if previous.id() != node.id() {
                    node.push_requirement(previous);
                }
            }
            self.resource_users.insert(*resource, Arc::downgrade(node));
        }

        node.mark_submitted();
        self.inflight.increment();
        trace!(node = node.id(), "node submitted");

        let node = Arc::clone(node);
        let errors = Arc::clone(&self.errors);
        let inflight = Arc::clone(&self.inflight);
        self.rt.spawn(async move {
            for requirement in node.requirements() {
                requirement.completed().await;
            }
            node.record_started();
            if let Some(operation) = node.take_operation() {
                let kernel = operation.is_kernel();
                let kind = operation.kind();
                let device = node.execution_hints().device_binding();
                match tokio::task::spawn_blocking(move || operation.run(device)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => errors.report(error),
                    // The body panicked on the blocking pool; capture it
                    // with the classification of the operation kind.
                    Err(_) if kernel => {
                        errors.report(OffloadError::kernel(format!("{kind} panicked"), device))
                    }
                    Err(_) => errors.report(OffloadError::runtime_op(format!("{kind} panicked"))),
                }
            }
            node.mark_complete();
            trace!(node = node.id(), "node complete");
            inflight.decrement();
        });
    }

    /// Block until every node submitted so far has completed. This is
    /// the synchronization point that surfaces asynchronous errors.
    pub(crate) fn flush_sync(&self) {
        self.inflight.wait_for_drain();
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.inflight.current()
    }
}

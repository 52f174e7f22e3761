//! Nodes of the execution DAG.
//!
//! A node is one tracked unit of asynchronous work: an operation, its
//! execution hints, and the requirement edges it must wait on. Nodes
//! move Created -> Submitted -> Complete and never go back.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::core::errors::OffloadError;
use crate::rt::hints::{DeviceId, ExecutionHints, ProfilingTimes, Shape};
use crate::rt::lock;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a deferred resource requirement.
///
/// The executor serializes operations that declare the same resource;
/// the resource itself (its storage, its lifetime) is managed outside
/// this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(u64);

impl ResourceId {
    pub fn fresh() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// The work carried by a node.
///
/// `SingleTask` and `ParallelFor` are kernel-classified: a failure in
/// their body is recorded as a kernel error and will drive the fallback
/// submission path. `Custom` covers interop-style host work whose
/// failures are runtime-classified and deliberately do not trigger
/// fallback.
pub enum Operation {
    SingleTask(Box<dyn FnOnce() -> anyhow::Result<()> + Send>),
    ParallelFor {
        shape: Shape,
        body: Box<dyn Fn(u64) -> anyhow::Result<()> + Send + Sync>,
    },
    Custom(Box<dyn FnOnce() -> anyhow::Result<()> + Send>),
}

impl Operation {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::SingleTask(_) => "single-task",
            Self::ParallelFor { .. } => "parallel-for",
            Self::Custom(_) => "custom",
        }
    }

    pub(crate) fn is_kernel(&self) -> bool {
        !matches!(self, Self::Custom(_))
    }

    /// Run the operation body to completion, classifying any failure.
    pub(crate) fn run(self, device: Option<DeviceId>) -> Result<(), OffloadError> {
        match self {
            Self::SingleTask(body) => body()
                .map_err(|err| OffloadError::kernel_with_source("single task failed", device, err)),
            Self::ParallelFor { shape, body } => {
                for item in 0..shape.num_items() {
                    body(item).map_err(|err| {
                        OffloadError::kernel_with_source(
                            format!("parallel for failed at item {item}"),
                            device,
                            err,
                        )
                    })?;
                }
                Ok(())
            }
            Self::Custom(body) => body()
                .map_err(|err| OffloadError::runtime_op_with_source("custom operation failed", err)),
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Operation").field(&self.kind()).finish()
    }
}

/// Lifecycle of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Created,
    Submitted,
    Complete,
}

/// One tracked unit of asynchronous work.
///
/// Ownership: the submitted-operations tracker and any dependents hold
/// strong references; the queue's in-order chain holds a weak one, so a
/// node's lifetime is never extended just to serve as a chaining anchor.
pub struct DagNode {
    id: u64,
    hints: ExecutionHints,
    resources: Vec<ResourceId>,
    requirements: Mutex<Vec<Arc<DagNode>>>,
    operation: Mutex<Option<Operation>>,
    state: Mutex<NodeState>,
    state_changed: Condvar,
    completed_tx: watch::Sender<bool>,
    completed_rx: watch::Receiver<bool>,
    profiling: Mutex<Option<ProfilingTimes>>,
}

impl DagNode {
    pub(crate) fn new(
        operation: Operation,
        hints: ExecutionHints,
        requirements: Vec<Arc<DagNode>>,
        resources: Vec<ResourceId>,
    ) -> Arc<Self> {
        let (completed_tx, completed_rx) = watch::channel(false);
        Arc::new(Self {
            id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
            hints,
            resources,
            requirements: Mutex::new(requirements),
            operation: Mutex::new(Some(operation)),
            state: Mutex::new(NodeState::Created),
            state_changed: Condvar::new(),
            completed_tx,
            completed_rx,
            profiling: Mutex::new(None),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn execution_hints(&self) -> &ExecutionHints {
        &self.hints
    }

    pub fn state(&self) -> NodeState {
        *lock(&self.state)
    }

    pub fn is_submitted(&self) -> bool {
        !matches!(self.state(), NodeState::Created)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state(), NodeState::Complete)
    }

    /// Block the calling thread until the node completes.
    pub fn wait(&self) {
        let mut state = lock(&self.state);
        while *state != NodeState::Complete {
            state = self
                .state_changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Snapshot of the requirement edges. Frozen once the node is
    /// submitted.
    pub fn requirements(&self) -> Vec<Arc<DagNode>> {
        lock(&self.requirements).clone()
    }

    pub fn profiling(&self) -> Option<ProfilingTimes> {
        *lock(&self.profiling)
    }

    pub(crate) fn resources(&self) -> &[ResourceId] {
        &self.resources
    }

    /// Add a requirement edge. Only valid before submission; the
    /// executor snapshots the edge list when the node's task starts.
    pub(crate) fn push_requirement(&self, requirement: Arc<DagNode>) {
        debug_assert!(!self.is_submitted());
        lock(&self.requirements).push(requirement);
    }

    pub(crate) fn take_operation(&self) -> Option<Operation> {
        lock(&self.operation).take()
    }

    pub(crate) fn mark_submitted(&self) {
        if self.hints.profiling_enabled() {
            *lock(&self.profiling) = Some(ProfilingTimes::at_submission());
        }
        let mut state = lock(&self.state);
        debug_assert_eq!(*state, NodeState::Created);
        *state = NodeState::Submitted;
    }

    pub(crate) fn record_started(&self) {
        if let Some(times) = lock(&self.profiling).as_mut() {
            times.started = Some(Utc::now());
        }
    }

    pub(crate) fn mark_complete(&self) {
        if let Some(times) = lock(&self.profiling).as_mut() {
            times.finished = Some(Utc::now());
        }
        {
            let mut state = lock(&self.state);
            *state = NodeState::Complete;
        }
        self.state_changed.notify_all();
        let _ = self.completed_tx.send(true);
    }

    /// Executor-side wait: resolves when the node completes, without
    /// blocking a worker thread.
    pub(crate) async fn completed(&self) {
        let mut rx = self.completed_rx.clone();
        let _ = rx.wait_for(|done| *done).await;
    }
}

impl fmt::Debug for DagNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DagNode")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_node(hints: ExecutionHints) -> Arc<DagNode> {
        DagNode::new(
            Operation::SingleTask(Box::new(|| Ok(()))),
            hints,
            Vec::new(),
            Vec::new(),
        )
    }

    #[test]
    fn test_state_transitions() {
        let node = noop_node(ExecutionHints::new());
        assert!(!node.is_submitted());
        assert!(!node.is_complete());

        node.mark_submitted();
        assert!(node.is_submitted());
        assert!(!node.is_complete());

        node.mark_complete();
        assert!(node.is_submitted());
        assert!(node.is_complete());
        // wait on a complete node returns immediately
        node.wait();
    }

    #[test]
    fn test_profiling_only_when_hinted() {
        let node = noop_node(ExecutionHints::new());
        node.mark_submitted();
        node.mark_complete();
        assert!(node.profiling().is_none());

        let mut hints = ExecutionHints::new();
        hints.set_profiling(true);
        let node = noop_node(hints);
        node.mark_submitted();
        node.record_started();
        node.mark_complete();
        let times = node.profiling().expect("profiling times recorded");
        assert!(times.started.is_some());
        assert!(times.finished.is_some());
    }

    #[test]
    fn test_resource_ids_are_unique() {
        let a = ResourceId::fresh();
        let b = ResourceId::fresh();
        assert_ne!(a, b);
    }
}

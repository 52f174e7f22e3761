//! Events returned from queue submissions.

use std::fmt;
use std::sync::Arc;

use crate::core::errors::Result;
use crate::rt::hints::ProfilingTimes;
use crate::rt::node::DagNode;
use crate::submission::context::AsyncHandler;
use crate::submission::deliver_async_errors;

/// Handle to one submitted operation.
///
/// An event may be empty: a command group that registered no operation
/// produces an event with no node behind it, whose `wait` returns
/// immediately.
#[derive(Clone)]
pub struct Event {
    node: Option<Arc<DagNode>>,
    handler: Option<AsyncHandler>,
}

impl Event {
    pub(crate) fn new(node: Arc<DagNode>, handler: Option<AsyncHandler>) -> Self {
        Self {
            node: Some(node),
            handler,
        }
    }

    pub(crate) fn empty(handler: Option<AsyncHandler>) -> Self {
        Self {
            node: None,
            handler,
        }
    }

    /// The node behind this event, if any.
    pub fn node(&self) -> Option<&Arc<DagNode>> {
        self.node.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.node.as_ref().map_or(true, |node| node.is_complete())
    }

    /// Block until the operation behind this event completes.
    pub fn wait(&self) {
        if let Some(node) = &self.node {
            node.wait();
        }
    }

    /// Wait, then drain queued asynchronous errors: delivered to the
    /// async handler if one is installed, returned as an error
    /// otherwise.
    pub fn wait_and_throw(&self) -> Result<()> {
        self.wait();
        deliver_async_errors(self.handler.as_ref())
    }

    /// Profiling timestamps, present once the operation ran on a queue
    /// with profiling enabled.
    pub fn profiling(&self) -> Option<ProfilingTimes> {
        self.node.as_ref().and_then(|node| node.profiling())
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("node", &self.node.as_ref().map(|node| node.id()))
            .finish()
    }
}

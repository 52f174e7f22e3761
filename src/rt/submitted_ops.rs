//! Runtime-scoped tracker of in-flight operations.

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::rt::lock;
use crate::rt::node::DagNode;

/// Registry of submitted, not-yet-pruned nodes.
///
/// Entries are removed only by opportunistic pruning of completed nodes
/// inside `update_with_submission`, under the same lock used for
/// snapshotting, so a snapshot never races a removal mid-copy. All
/// waits copy the current set under the lock and block outside it;
/// submissions made while a wait is in progress are not covered by that
/// wait.
pub struct SubmittedOps {
    ops: Mutex<Vec<Arc<DagNode>>>,
}

impl SubmittedOps {
    pub(crate) fn new() -> Self {
        Self {
            ops: Mutex::new(Vec::new()),
        }
    }

    /// Record a freshly submitted node, pruning completed entries first
    /// so the registry cannot grow without bound over a long-running
    /// process.
    pub fn update_with_submission(&self, node: Arc<DagNode>) {
        debug_assert!(node.is_submitted());
        let mut ops = lock(&self.ops);
        ops.retain(|tracked| !tracked.is_complete());
        ops.push(node);
    }

    /// Block until every currently tracked node completes.
    pub fn wait_for_all(&self) {
        let snapshot = lock(&self.ops).clone();
        for node in snapshot {
            debug_assert!(node.is_submitted());
            node.wait();
        }
    }

    /// Block until every tracked node carrying the given group id
    /// completes. Nodes without the group hint are not covered.
    pub fn wait_for_group(&self, group: u64) {
        debug!(group, "waiting for node group");
        let snapshot = lock(&self.ops).clone();
        for node in snapshot {
            debug_assert!(node.is_submitted());
            if node.execution_hints().node_group() == Some(group) {
                debug!(group, node = node.id(), "waiting for group member");
                node.wait();
            }
        }
    }

    /// Non-blocking snapshot of the tracked nodes carrying the given
    /// group id, for callers that want to inspect or join the group
    /// themselves.
    pub fn get_group(&self, group: u64) -> Vec<Arc<DagNode>> {
        lock(&self.ops)
            .iter()
            .filter(|node| node.execution_hints().node_group() == Some(group))
            .cloned()
            .collect()
    }

    /// Number of tracked (submitted, not yet pruned) nodes.
    pub fn len(&self) -> usize {
        lock(&self.ops).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

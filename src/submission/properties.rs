//! Typed configuration for queues and individual submissions.
//!
//! Optional behaviors that the runtime understands are named fields
//! here rather than a type-erased property bag: what each field does is
//! documented on it, and unknown directives cannot exist.

use serde::{Deserialize, Serialize};

use crate::rt::hints::Shape;
use crate::submission::context::Device;

/// Properties fixed at queue construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueProperties {
    /// Enforce a total execution order among this queue's submissions:
    /// each submission gains a dependency on the previous one.
    pub in_order: bool,
    /// Record wall-clock profiling timestamps on every node submitted
    /// through this queue.
    pub enable_profiling: bool,
}

impl QueueProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_in_order(mut self, in_order: bool) -> Self {
        self.in_order = in_order;
        self
    }

    pub fn with_profiling(mut self, enable: bool) -> Self {
        self.enable_profiling = enable;
        self
    }
}

/// Per-submission properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitProperties {
    retarget: Option<Device>,
    node_group: Option<u64>,
    preferred_group_sizes: Vec<Shape>,
}

impl SubmitProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run this submission on a different device than the queue's.
    ///
    /// Retargeting to a device outside the queue's context is allowed
    /// but risky for operations touching shared allocations made
    /// through the queue's context; the queue logs a warning and
    /// proceeds.
    pub fn with_retarget(mut self, device: Device) -> Self {
        self.retarget = Some(device);
        self
    }

    /// Tag the resulting node(s) with a group id so they can be waited
    /// on collectively through the submitted-operations tracker.
    pub fn with_group(mut self, group: u64) -> Self {
        self.node_group = Some(group);
        self
    }

    /// Suggest a launch group size. May be given once per rank (1-3);
    /// the one matching a kernel's launch shape applies to it.
    pub fn with_preferred_group_size(mut self, shape: Shape) -> Self {
        self.preferred_group_sizes.push(shape);
        self
    }

    pub fn retarget(&self) -> Option<Device> {
        self.retarget
    }

    pub fn node_group(&self) -> Option<u64> {
        self.node_group
    }

    pub fn preferred_group_sizes(&self) -> &[Shape] {
        &self.preferred_group_sizes
    }
}

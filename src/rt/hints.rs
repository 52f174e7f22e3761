//! Execution hints attached to submitted operations.
//!
//! A hint set is a small mergeable directive bag: device binding,
//! profiling, node grouping and preferred launch group size. Queues own
//! a default set and overlay per-submission customizations on top of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a device known to the runtime.
///
/// Device enumeration, capabilities and selection heuristics live
/// outside this crate; here a device is pure identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId {
    pub index: u32,
}

impl DeviceId {
    pub const fn new(index: u32) -> Self {
        Self { index }
    }
}

/// A 1-3 dimensional launch shape.
///
/// Unused trailing extents are normalized to 1 so that equality and
/// serialization only depend on the meaningful dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    extents: [u64; 3],
    rank: usize,
}

impl Shape {
    pub const fn d1(x: u64) -> Self {
        Self {
            extents: [x, 1, 1],
            rank: 1,
        }
    }

    pub const fn d2(x: u64, y: u64) -> Self {
        Self {
            extents: [x, y, 1],
            rank: 2,
        }
    }

    pub const fn d3(x: u64, y: u64, z: u64) -> Self {
        Self {
            extents: [x, y, z],
            rank: 3,
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// The meaningful extents, one per dimension.
    pub fn extents(&self) -> &[u64] {
        &self.extents[..self.rank]
    }

    /// Total number of work items described by this shape.
    pub fn num_items(&self) -> u64 {
        self.extents.iter().product()
    }
}

/// Wall-clock timestamps recorded for a node when the profiling hint is
/// set on its queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilingTimes {
    /// When the node was handed to the executor.
    pub submitted: DateTime<Utc>,
    /// When the operation body started running.
    pub started: Option<DateTime<Utc>>,
    /// When the operation body finished.
    pub finished: Option<DateTime<Utc>>,
}

impl ProfilingTimes {
    pub(crate) fn at_submission() -> Self {
        Self {
            submitted: Utc::now(),
            started: None,
            finished: None,
        }
    }
}

/// A mergeable set of execution directives.
///
/// Every field is optional; `overwrite_with` overlays another set on
/// top of this one, with the other set winning for every hint it
/// carries. Two hint sets compare equal iff every hint matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionHints {
    bind_to_device: Option<DeviceId>,
    enable_profiling: Option<bool>,
    node_group: Option<u64>,
    preferred_group_size: Option<Shape>,
}

impl ExecutionHints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind execution to a specific device.
    pub fn bind_to_device(&mut self, device: DeviceId) {
        self.bind_to_device = Some(device);
    }

    pub fn device_binding(&self) -> Option<DeviceId> {
        self.bind_to_device
    }

    pub fn set_profiling(&mut self, enabled: bool) {
        self.enable_profiling = Some(enabled);
    }

    pub fn profiling_enabled(&self) -> bool {
        self.enable_profiling.unwrap_or(false)
    }

    /// Tag operations with a group id for group-scoped waits.
    pub fn set_node_group(&mut self, group: u64) {
        self.node_group = Some(group);
    }

    pub fn node_group(&self) -> Option<u64> {
        self.node_group
    }

    pub fn set_preferred_group_size(&mut self, shape: Shape) {
        self.preferred_group_size = Some(shape);
    }

    pub fn preferred_group_size(&self) -> Option<Shape> {
        self.preferred_group_size
    }

    /// Merge `other` into `self`, hint by hint. Hints present in `other`
    /// win; hints absent from `other` keep their current value.
    pub fn overwrite_with(&mut self, other: &ExecutionHints) {
        if other.bind_to_device.is_some() {
            self.bind_to_device = other.bind_to_device;
        }
        if other.enable_profiling.is_some() {
            self.enable_profiling = other.enable_profiling;
        }
        if other.node_group.is_some() {
            self.node_group = other.node_group;
        }
        if other.preferred_group_size.is_some() {
            self.preferred_group_size = other.preferred_group_size;
        }
    }
}

//! offload - asynchronous submission and dependency tracking for
//! heterogeneous compute.
//!
//! User work (kernels, interop operations) is submitted through logical
//! [`Queue`]s, translated into nodes of a directed acyclic execution
//! graph, annotated with [`ExecutionHints`], and tracked until
//! completion. Queues reconcile an optional strict in-order contract
//! with the asynchronous graph executor, offer transparent fallback to
//! a secondary queue on kernel failure, and expose a hook registry
//! through which implicit resource requirements attach themselves to
//! every future submission.

// Core infrastructure modules
pub mod core {
    pub mod errors;
}

// Runtime internals and the user-facing submission layer
pub mod rt;
pub mod submission;

// Re-exports for convenience
pub use crate::core::errors::{OffloadError, Result};
pub use crate::rt::hints::{DeviceId, ExecutionHints, ProfilingTimes, Shape};
pub use crate::rt::node::{DagNode, NodeState, ResourceId};
pub use crate::rt::runtime::{runtime, Runtime};
pub use crate::rt::submitted_ops::SubmittedOps;
pub use crate::submission::command_group::CommandGroup;
pub use crate::submission::context::{AsyncHandler, Context, Device};
pub use crate::submission::event::Event;
pub use crate::submission::hooks::{HookId, SubmissionHookFn, SubmissionHooks};
pub use crate::submission::placeholder::{
    automatic_require, AutomaticPlaceholderRequirement, PlaceholderResource,
};
pub use crate::submission::properties::{QueueProperties, SubmitProperties};
pub use crate::submission::queue::{Queue, QueueBuilder};

/// Install a plain fmt subscriber for the crate's tracing output.
/// Convenience for binaries and tests; a no-op if a global subscriber
/// is already set.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();
}

//! The user-facing submission layer: queues, command groups, events,
//! submission hooks and the automatic placeholder requirement.

pub mod command_group;
pub mod context;
pub mod event;
pub mod hooks;
pub mod placeholder;
pub mod properties;
pub mod queue;

use crate::core::errors::{OffloadError, Result};
use crate::rt::runtime::runtime;
use crate::submission::context::AsyncHandler;

/// Drain the runtime error registry. With a handler, the batch is
/// delivered to it and the call succeeds; without one, a non-empty
/// batch is returned as an aggregate error so nothing is silently
/// discarded.
pub(crate) fn deliver_async_errors(handler: Option<&AsyncHandler>) -> Result<()> {
    let drained = runtime().errors().drain();
    if drained.is_empty() {
        return Ok(());
    }
    match handler {
        Some(handler) => {
            handler(drained);
            Ok(())
        }
        None => Err(OffloadError::async_errors(drained)),
    }
}

//! Automatic placeholder requirements.
//!
//! A placeholder resource is a deferred dependency declaration: work
//! that touches it must be serialized after the resource's previous
//! user, but the binding happens at submission time rather than when
//! the user's code runs. The automatic requirement keeps such a
//! resource attached to every submission on a queue until released.

use std::sync::Arc;

use crate::rt::node::ResourceId;
use crate::submission::hooks::{HookId, SubmissionHooks};
use crate::submission::queue::Queue;

/// A deferred resource requirement, reduced to process-unique identity.
/// The storage it stands for is managed outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderResource {
    id: ResourceId,
}

impl PlaceholderResource {
    pub fn new() -> Self {
        Self {
            id: ResourceId::fresh(),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }
}

impl Default for PlaceholderResource {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a placeholder resource attached to every submission on one
/// queue via a registered submission hook.
///
/// States: required (hook registered) or unattached. Construction
/// acquires; `release` and `reacquire` move between the states and are
/// both idempotent; dropping the object releases, so no hook outlives
/// its owner and no future submission can reference a resource declared
/// by a now-gone object.
pub struct AutomaticPlaceholderRequirement {
    resource: PlaceholderResource,
    hooks: Arc<SubmissionHooks>,
    hook_id: Option<HookId>,
}

impl AutomaticPlaceholderRequirement {
    pub(crate) fn new(hooks: Arc<SubmissionHooks>, resource: &PlaceholderResource) -> Self {
        let mut requirement = Self {
            resource: *resource,
            hooks,
            hook_id: None,
        };
        requirement.acquire();
        requirement
    }

    fn acquire(&mut self) {
        let resource = self.resource;
        self.hook_id = Some(self.hooks.add(Box::new(move |cg| cg.require(&resource))));
    }

    /// Re-attach the requirement if it is currently released.
    pub fn reacquire(&mut self) {
        if self.hook_id.is_none() {
            self.acquire();
        }
    }

    /// Detach the requirement; future submissions no longer carry it.
    pub fn release(&mut self) {
        if let Some(id) = self.hook_id.take() {
            self.hooks.remove(id);
        }
    }

    pub fn is_required(&self) -> bool {
        self.hook_id.is_some()
    }
}

impl Drop for AutomaticPlaceholderRequirement {
    fn drop(&mut self) {
        self.release();
    }
}

/// Attach `resource` to every future submission on `queue` until the
/// returned object is released or dropped.
pub fn automatic_require(
    queue: &Queue,
    resource: &PlaceholderResource,
) -> AutomaticPlaceholderRequirement {
    AutomaticPlaceholderRequirement::new(queue.hooks(), resource)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_is_idempotent() {
        let hooks = Arc::new(SubmissionHooks::new());
        let resource = PlaceholderResource::new();

        let mut req = AutomaticPlaceholderRequirement::new(Arc::clone(&hooks), &resource);
        assert!(req.is_required());
        assert_eq!(hooks.len(), 1);

        req.release();
        assert!(!req.is_required());
        assert!(hooks.is_empty());
        // Releasing again must not panic or disturb the registry.
        req.release();
        assert!(hooks.is_empty());

        req.reacquire();
        assert!(req.is_required());
        assert_eq!(hooks.len(), 1);
        // Reacquiring while attached is a no-op.
        req.reacquire();
        assert_eq!(hooks.len(), 1);
    }

    #[test]
    fn test_drop_releases_hook() {
        let hooks = Arc::new(SubmissionHooks::new());
        {
            let _req =
                AutomaticPlaceholderRequirement::new(Arc::clone(&hooks), &PlaceholderResource::new());
            assert_eq!(hooks.len(), 1);
        }
        assert!(hooks.is_empty());
    }
}

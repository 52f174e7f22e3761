//! The submission hook registry.
//!
//! Hooks run against every command-group builder before user code sees
//! it. They are the mechanism by which auxiliary features (most
//! prominently the automatic placeholder requirement) attach recurring,
//! implicit directives to every future submission on a queue.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::rt::lock;
use crate::submission::command_group::CommandGroup;

/// Identifier returned by [`SubmissionHooks::add`]. Ids are never
/// reused while their hook is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

/// A registered hook.
pub type SubmissionHookFn = Box<dyn FnMut(&mut CommandGroup) + Send>;

/// Ordered set of submission hooks.
///
/// Ids are handed out from a monotonic counter and the table is keyed
/// by id, so iteration order is insertion order.
pub struct SubmissionHooks {
    inner: Mutex<HookTable>,
}

struct HookTable {
    next_id: u64,
    hooks: BTreeMap<u64, SubmissionHookFn>,
}

impl SubmissionHooks {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HookTable {
                next_id: 0,
                hooks: BTreeMap::new(),
            }),
        }
    }

    /// Register a hook; returns a fresh id for later removal.
    pub fn add(&self, hook: SubmissionHookFn) -> HookId {
        let mut table = lock(&self.inner);
        let id = table.next_id;
        table.next_id += 1;
        table.hooks.insert(id, hook);
        HookId(id)
    }

    /// Remove a registration. Removing an unknown or already-removed id
    /// is a silent no-op, so cleanup paths need no existence check.
    pub fn remove(&self, id: HookId) {
        lock(&self.inner).hooks.remove(&id.0);
    }

    /// Run every registered hook against the builder, insertion order.
    pub(crate) fn run_all(&self, cg: &mut CommandGroup) {
        for hook in lock(&self.inner).hooks.values_mut() {
            hook(cg);
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SubmissionHooks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rt::hints::ExecutionHints;
    use crate::submission::context::{Context, Device};
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex as StdMutex};

    fn scratch_group() -> CommandGroup {
        CommandGroup::new(Context::new(Device::host()), ExecutionHints::new())
    }

    #[test]
    fn test_hooks_run_in_insertion_order() {
        let hooks = SubmissionHooks::new();
        let order = Arc::new(StdMutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            hooks.add(Box::new(move |_cg| order.lock().unwrap().push(tag)));
        }

        let mut cg = scratch_group();
        hooks.run_all(&mut cg);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let hooks = SubmissionHooks::new();
        let id = hooks.add(Box::new(|_cg| {}));
        assert_eq!(hooks.len(), 1);

        hooks.remove(id);
        assert!(hooks.is_empty());
        // Second removal, and removal of a never-issued id, are no-ops.
        hooks.remove(id);
        assert!(hooks.is_empty());
    }

    #[test]
    fn test_ids_are_fresh_after_removal() {
        let hooks = SubmissionHooks::new();
        let first = hooks.add(Box::new(|_cg| {}));
        hooks.remove(first);
        let second = hooks.add(Box::new(|_cg| {}));
        assert_ne!(first, second);
    }
}

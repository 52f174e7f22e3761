//! The per-submission command-group builder.
//!
//! A builder collects directives (dependencies, placeholder
//! requirements, preferred group sizes) and the operations the user
//! registers, then materializes them into DAG nodes when the queue
//! extracts the submission.

use std::sync::Arc;

use crate::rt::hints::{ExecutionHints, Shape};
use crate::rt::node::{DagNode, Operation, ResourceId};
use crate::submission::context::{Context, Device};
use crate::submission::event::Event;
use crate::submission::placeholder::PlaceholderResource;

pub struct CommandGroup {
    ctx: Context,
    hints: ExecutionHints,
    /// One optional preferred group size per rank; the slot matching a
    /// kernel's launch shape applies to that kernel.
    preferred_group_sizes: [Option<Shape>; 3],
    dependencies: Vec<Arc<DagNode>>,
    resource_requirements: Vec<ResourceId>,
    staged: Vec<Operation>,
}

impl CommandGroup {
    pub(crate) fn new(ctx: Context, hints: ExecutionHints) -> Self {
        Self {
            ctx,
            hints,
            preferred_group_sizes: [None; 3],
            dependencies: Vec::new(),
            resource_requirements: Vec::new(),
            staged: Vec::new(),
        }
    }

    /// The context this submission was built against.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// The device this submission resolved to.
    pub fn device(&self) -> Device {
        self.hints
            .device_binding()
            .map(Device::with_id)
            .unwrap_or_else(Device::host)
    }

    pub fn execution_hints(&self) -> &ExecutionHints {
        &self.hints
    }

    /// Make every operation of this group depend on the work behind
    /// `event`. An empty event contributes nothing.
    pub fn depends_on(&mut self, event: &Event) {
        if let Some(node) = event.node() {
            self.dependencies.push(Arc::clone(node));
        }
    }

    pub fn depends_on_all(&mut self, events: &[Event]) {
        for event in events {
            self.depends_on(event);
        }
    }

    pub(crate) fn depends_on_node(&mut self, node: Arc<DagNode>) {
        self.dependencies.push(node);
    }

    /// Declare a deferred resource requirement: the resulting node(s)
    /// will be serialized after the resource's previous user.
    pub fn require(&mut self, resource: &PlaceholderResource) {
        self.resource_requirements.push(resource.id());
    }

    /// Suggest a launch group size for kernels of the matching rank.
    pub fn set_preferred_group_size(&mut self, shape: Shape) {
        self.preferred_group_sizes[shape.rank() - 1] = Some(shape);
    }

    /// Register a single-item kernel task.
    pub fn single_task<F>(&mut self, f: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.staged.push(Operation::SingleTask(Box::new(f)));
    }

    /// Register a kernel over `shape`, invoked once per linear item
    /// index.
    pub fn parallel_for<F>(&mut self, shape: Shape, f: F)
    where
        F: Fn(u64) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.staged.push(Operation::ParallelFor {
            shape,
            body: Box::new(f),
        });
    }

    /// Register non-kernel interop work. Failures are runtime-classified
    /// and do not drive the kernel fallback path.
    pub fn custom_operation<F>(&mut self, f: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.staged.push(Operation::Custom(Box::new(f)));
    }

    /// Number of operations registered so far.
    pub fn num_operations(&self) -> usize {
        self.staged.len()
    }

    /// Build one DAG node per registered operation. Group-wide
    /// dependencies and resource requirements apply to every node;
    /// preferred group sizes land in the hints of kernels with a
    /// matching launch rank.
    pub(crate) fn materialize(self) -> Vec<Arc<DagNode>> {
        let Self {
            hints,
            preferred_group_sizes,
            dependencies,
            resource_requirements,
            staged,
            ..
        } = self;

        staged
            .into_iter()
            .map(|operation| {
                let mut node_hints = hints.clone();
                if let Operation::ParallelFor { shape, .. } = &operation {
                    if let Some(preferred) = preferred_group_sizes[shape.rank() - 1] {
                        node_hints.set_preferred_group_size(preferred);
                    }
                }
                DagNode::new(
                    operation,
                    node_hints,
                    dependencies.clone(),
                    resource_requirements.clone(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rt::hints::DeviceId;
    use pretty_assertions::assert_eq;

    fn scratch_group() -> CommandGroup {
        let mut hints = ExecutionHints::new();
        hints.bind_to_device(DeviceId::new(4));
        CommandGroup::new(Context::new(Device::new(4)), hints)
    }

    #[test]
    fn test_materialize_one_node_per_operation() {
        let mut cg = scratch_group();
        cg.single_task(|| Ok(()));
        cg.parallel_for(Shape::d1(8), |_| Ok(()));
        assert_eq!(cg.num_operations(), 2);

        let nodes = cg.materialize();
        assert_eq!(nodes.len(), 2);
        for node in &nodes {
            assert_eq!(
                node.execution_hints().device_binding(),
                Some(DeviceId::new(4))
            );
        }
    }

    #[test]
    fn test_preferred_group_size_applies_by_rank() {
        let mut cg = scratch_group();
        cg.set_preferred_group_size(Shape::d2(8, 8));
        cg.parallel_for(Shape::d2(64, 64), |_| Ok(()));
        cg.parallel_for(Shape::d1(64), |_| Ok(()));

        let nodes = cg.materialize();
        assert_eq!(
            nodes[0].execution_hints().preferred_group_size(),
            Some(Shape::d2(8, 8))
        );
        assert_eq!(nodes[1].execution_hints().preferred_group_size(), None);
    }

    #[test]
    fn test_group_dependencies_apply_to_every_node() {
        let dep = {
            let mut cg = scratch_group();
            cg.single_task(|| Ok(()));
            cg.materialize().pop().expect("one node")
        };

        let mut cg = scratch_group();
        cg.depends_on_node(Arc::clone(&dep));
        cg.single_task(|| Ok(()));
        cg.single_task(|| Ok(()));

        for node in cg.materialize() {
            let reqs = node.requirements();
            assert_eq!(reqs.len(), 1);
            assert!(Arc::ptr_eq(&reqs[0], &dep));
        }
    }
}

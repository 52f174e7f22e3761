//! Logical submission queues.
//!
//! A queue translates user callbacks into DAG nodes: it resolves
//! execution hints, runs the registered submission hooks, injects the
//! in-order dependency where configured, extracts the node the command
//! group produced, and hands it to the executor and the
//! submitted-operations tracker.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, error, warn};

use crate::core::errors::{OffloadError, Result};
use crate::rt::hints::{ExecutionHints, Shape};
use crate::rt::lock;
use crate::rt::node::DagNode;
use crate::rt::runtime::runtime;
use crate::submission::command_group::CommandGroup;
use crate::submission::context::{AsyncHandler, Context, Device};
use crate::submission::deliver_async_errors;
use crate::submission::event::Event;
use crate::submission::hooks::SubmissionHooks;
use crate::submission::properties::{QueueProperties, SubmitProperties};

/// Mutable queue state, guarded by the submission-exclusivity lock.
struct QueueState {
    /// Non-owning reference to the previous submission, used by
    /// in-order queues to chain the next one. Being weak, it never
    /// extends a node's lifetime; an expired reference simply means
    /// there is nothing left to order against.
    previous_submission: Weak<DagNode>,
}

/// A logical submission queue bound to one device of a context.
pub struct Queue {
    ctx: Context,
    handler: Option<AsyncHandler>,
    /// Immutable after construction; always carries a device binding.
    default_hints: ExecutionHints,
    is_in_order: bool,
    hooks: Arc<SubmissionHooks>,
    state: Mutex<QueueState>,
}

impl Queue {
    /// Queue for `device` with a context derived from it.
    pub fn new(device: Device) -> Self {
        Self::assemble(Context::new(device), device, None, QueueProperties::new())
    }

    pub fn builder() -> QueueBuilder {
        QueueBuilder::default()
    }

    fn assemble(
        ctx: Context,
        device: Device,
        handler: Option<AsyncHandler>,
        properties: QueueProperties,
    ) -> Self {
        let handler = handler.or_else(|| ctx.handler());
        let mut default_hints = ExecutionHints::new();
        default_hints.bind_to_device(device.id());
        if properties.enable_profiling {
            default_hints.set_profiling(true);
        }
        debug_assert!(default_hints.device_binding().is_some());
        Self {
            ctx,
            handler,
            default_hints,
            is_in_order: properties.in_order,
            hooks: Arc::new(SubmissionHooks::new()),
            state: Mutex::new(QueueState {
                previous_submission: Weak::new(),
            }),
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// The device this queue's submissions bind to by default.
    pub fn device(&self) -> Device {
        self.default_hints
            .device_binding()
            .map(Device::with_id)
            .unwrap_or_else(Device::host)
    }

    pub fn is_in_order(&self) -> bool {
        self.is_in_order
    }

    pub(crate) fn hooks(&self) -> Arc<SubmissionHooks> {
        Arc::clone(&self.hooks)
    }

    /// Submit with default properties.
    pub fn submit<F>(&self, cgf: F) -> Result<Event>
    where
        F: FnOnce(&mut CommandGroup) -> anyhow::Result<()>,
    {
        self.submit_with(&SubmitProperties::new(), cgf)
    }

    /// Submit a command group.
    ///
    /// The callback receives the builder after hook execution and, on
    /// an in-order queue, after the dependency on the previous
    /// submission has been injected. It is expected to register exactly
    /// one operation: zero operations yield an empty event, more than
    /// one is logged and the event wraps the last (every operation is
    /// still executed and tracked).
    pub fn submit_with<F>(&self, properties: &SubmitProperties, cgf: F) -> Result<Event>
    where
        F: FnOnce(&mut CommandGroup) -> anyhow::Result<()>,
    {
        // Serializes all state mutation for this queue instance; held
        // across hint resolution, hook execution, the in-order check
        // and node extraction, released before anything blocks.
        let mut state = lock(&self.state);

        let mut hints = self.default_hints.clone();
        if let Some(target) = properties.retarget() {
            if !self.ctx.contains_device(target) {
                warn!(
                    device = target.id().index,
                    "retargeting operation to a device that is not part of the queue's \
                     context; operations using shared allocations made through this \
                     queue's context may misbehave there"
                );
            }
            let mut custom = ExecutionHints::new();
            custom.bind_to_device(target.id());
            hints.overwrite_with(&custom);
        }
        if let Some(group) = properties.node_group() {
            hints.set_node_group(group);
        }

        let mut cg = CommandGroup::new(self.ctx.clone(), hints);
        for shape in properties.preferred_group_sizes() {
            cg.set_preferred_group_size(*shape);
        }

        self.hooks.run_all(&mut cg);

        if self.is_in_order {
            if let Some(previous) = state.previous_submission.upgrade() {
                cg.depends_on_node(previous);
            }
        }

        cgf(&mut cg).map_err(OffloadError::submission)?;

        let mut nodes = cg.materialize();
        if nodes.is_empty() {
            error!(
                "command group evaluation did not produce any operation; \
                 is there an operation registered inside the command group?"
            );
            return Ok(Event::empty(self.handler.clone()));
        }
        if nodes.len() > 1 {
            error!(
                count = nodes.len(),
                "multiple operations registered in a single command group; a command \
                 group must decay to a single operation, returning the event of the last"
            );
        }

        let rt = runtime();
        for node in &nodes {
            rt.executor().submit(node);
            rt.submitted_ops().update_with_submission(Arc::clone(node));
        }

        let Some(node) = nodes.pop() else {
            return Ok(Event::empty(self.handler.clone()));
        };
        if self.is_in_order {
            state.previous_submission = Arc::downgrade(&node);
        }
        Ok(Event::new(node, self.handler.clone()))
    }

    /// Submit with transparent fallback to `secondary`.
    ///
    /// The submission is attempted on this queue and flushed; if the
    /// flush surfaces a kernel-classified error, or the submission
    /// itself fails synchronously, the result is discarded and the
    /// callback resubmitted identically on `secondary`. Non-kernel
    /// errors (allocation failures and the like) do not trigger
    /// fallback.
    ///
    /// Known limitation: failure detection compares two reads of the
    /// runtime error counter. If an async handler drains the registry
    /// concurrently, a genuine kernel failure can be missed and the
    /// primary result returned.
    pub fn submit_with_fallback<F>(
        &self,
        cgf: F,
        secondary: &Queue,
        properties: &SubmitProperties,
    ) -> Result<Event>
    where
        F: Fn(&mut CommandGroup) -> anyhow::Result<()>,
    {
        let errors = runtime().errors();
        let num_errors_begin = errors.num_errors();

        match self.submit_with(properties, |cg| cgf(cg)) {
            Ok(event) => {
                // Flush so that errors from this submission are visible.
                runtime().flush_sync();
                let num_errors_end = errors.num_errors();

                let mut kernel_failure = false;
                if num_errors_end != num_errors_begin {
                    errors.for_each_error(|err| {
                        if err.is_kernel_error() {
                            kernel_failure = true;
                        }
                    });
                }

                if !kernel_failure {
                    Ok(event)
                } else {
                    debug!("kernel failure detected after flush, resubmitting on secondary queue");
                    secondary.submit_with(properties, |cg| cgf(cg))
                }
            }
            Err(err) => {
                debug!(%err, "synchronous submission failure, resubmitting on secondary queue");
                secondary.submit_with(properties, |cg| cgf(cg))
            }
        }
    }

    /// Force a global flush, then block until all previously submitted
    /// work completes.
    pub fn wait(&self) {
        let rt = runtime();
        rt.flush_sync();
        rt.submitted_ops().wait_for_all();
    }

    /// [`wait`](Queue::wait), then re-raise queued asynchronous errors.
    pub fn wait_and_throw(&self) -> Result<()> {
        self.wait();
        self.throw_asynchronous()
    }

    /// Drain queued asynchronous errors: delivered to this queue's
    /// async handler if one is installed, returned as
    /// [`OffloadError::AsyncErrors`] otherwise.
    pub fn throw_asynchronous(&self) -> Result<()> {
        deliver_async_errors(self.handler.as_ref())
    }

    // ---- queue shortcuts ----

    pub fn single_task<F>(&self, f: F) -> Result<Event>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.submit(move |cg| {
            cg.single_task(f);
            Ok(())
        })
    }

    pub fn single_task_after<F>(&self, dependency: &Event, f: F) -> Result<Event>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.submit(move |cg| {
            cg.depends_on(dependency);
            cg.single_task(f);
            Ok(())
        })
    }

    pub fn parallel_for<F>(&self, shape: Shape, f: F) -> Result<Event>
    where
        F: Fn(u64) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.submit(move |cg| {
            cg.parallel_for(shape, f);
            Ok(())
        })
    }

    pub fn parallel_for_after<F>(&self, dependency: &Event, shape: Shape, f: F) -> Result<Event>
    where
        F: Fn(u64) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.submit(move |cg| {
            cg.depends_on(dependency);
            cg.parallel_for(shape, f);
            Ok(())
        })
    }
}

/// Two queues compare equal iff their default hint sets are equal,
/// not by identity.
impl PartialEq for Queue {
    fn eq(&self, other: &Self) -> bool {
        self.default_hints == other.default_hints
    }
}

impl Eq for Queue {}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("device", &self.device())
            .field("in_order", &self.is_in_order)
            .finish()
    }
}

/// Builder for queues needing more than a device: an explicit context,
/// a custom async handler, or non-default properties.
#[derive(Default)]
pub struct QueueBuilder {
    device: Option<Device>,
    context: Option<Context>,
    handler: Option<AsyncHandler>,
    properties: QueueProperties,
}

impl QueueBuilder {
    pub fn device(mut self, device: Device) -> Self {
        self.device = Some(device);
        self
    }

    pub fn context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    pub fn async_handler(mut self, handler: AsyncHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn properties(mut self, properties: QueueProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Build the queue. Fails if an explicit context was given and the
    /// device is not one of its devices.
    pub fn build(self) -> Result<Queue> {
        let device = self.device.unwrap_or_else(Device::host);
        let ctx = match self.context {
            Some(ctx) => {
                if !ctx.contains_device(device) {
                    return Err(OffloadError::invalid_object("queue: device is not in context"));
                }
                ctx
            }
            None => Context::new(device),
        };
        Ok(Queue::assemble(ctx, device, self.handler, self.properties))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_follows_default_hints() {
        let a = Queue::new(Device::new(1));
        let b = Queue::new(Device::new(1));
        let c = Queue::new(Device::new(2));
        assert_eq!(a, b);
        assert_ne!(a, c);

        // Same device, different properties: unequal hint sets.
        let profiled = Queue::builder()
            .device(Device::new(1))
            .properties(QueueProperties::new().with_profiling(true))
            .build()
            .unwrap();
        assert_ne!(a, profiled);

        // In-order is not a hint; it does not affect equality.
        let in_order = Queue::builder()
            .device(Device::new(1))
            .properties(QueueProperties::new().with_in_order(true))
            .build()
            .unwrap();
        assert_eq!(a, in_order);
    }

    #[test]
    fn test_builder_rejects_foreign_device() {
        let ctx = Context::with_devices(vec![Device::new(0), Device::new(1)]).unwrap();
        let err = Queue::builder()
            .device(Device::new(7))
            .context(ctx)
            .build()
            .unwrap_err();
        assert_eq!(err.category(), "invalid-object");
    }

    #[test]
    fn test_default_binding_is_present() {
        let queue = Queue::new(Device::new(3));
        assert_eq!(queue.device(), Device::new(3));
        assert!(!queue.is_in_order());
    }
}

//! # mtapi
//!
//! Ergonomic façade over the multicore task runtime: register actions under
//! jobs, submit tasks (solo, grouped, or queued) for execution on a fixed
//! worker pool, wait on their outcomes.
//!
//! [`Runtime`] is the RAII entry point — its `Drop` impl calls `Finalize` if
//! the caller forgot, the way the source repo's top-level runtime type does.
//! Everything else here is a thin pass-through to [`mtapi_runtime::Node`];
//! the actual scheduling engine lives there.
//!
//! ```ignore
//! use mtapi::{Runtime, NodeAttributes, ActionAttributes, TaskAttributes};
//!
//! let rt = Runtime::new(NodeAttributes::default()).unwrap();
//! rt.create_action(42, |_ctx, args, result| {
//!     result[..args.len()].copy_from_slice(args);
//!     Ok(())
//! }, ActionAttributes::new(rt.num_workers())).unwrap();
//!
//! let mut out = [0u8; 5];
//! let task = rt.start_task(42, b"hello", &mut out, TaskAttributes::default(), None, None).unwrap();
//! rt.wait_task(task, None).unwrap();
//! assert_eq!(&out, b"hello");
//! ```

pub use mtapi_core::{log_debug, log_error, log_info, log_trace, log_warn};
pub use mtapi_core::{Affinity, MtapiError, TaskState};
pub use mtapi_runtime::{
    Action, ActionAttributes, ActionBody, ActionFn, ActionHandle, CoreCallback, Group,
    GroupAttributes, GroupHandle, Job, JobHandle, NodeAttributes, PluginAction, Queue,
    QueueAttributes, QueueHandle, Task, TaskAttributes, TaskContext, TaskHandle, TaskOutcome,
};

use std::sync::Arc;
use std::time::Duration;

use mtapi_runtime::Node;

/// RAII handle to the process-wide node.
///
/// The calling thread is treated as worker 0's "caller" for the purposes of
/// re-entrant waiting (§4.3): a `Wait*` call runs the scheduler loop on the
/// calling thread instead of sleeping, so `Runtime` is not `Send`-restricted
/// to a single thread but every wait call it exposes participates in
/// dispatch from wherever it's called.
pub struct Runtime {
    node: Arc<Node>,
}

impl Runtime {
    /// Bring up the node with `attrs`. Fails with `NodeInitialized` if a
    /// node is already active in this process.
    pub fn new(attrs: NodeAttributes) -> Result<Self, MtapiError> {
        let node = Node::initialize(attrs, 0)?;
        Ok(Runtime { node })
    }

    /// Bring up the node with [`NodeAttributes::from_env`].
    pub fn from_env() -> Result<Self, MtapiError> {
        Self::new(NodeAttributes::from_env())
    }

    /// Attach to the node already initialized by some other `Runtime` in
    /// this process, if one exists.
    pub fn current() -> Option<Self> {
        Node::current().map(|node| Runtime { node })
    }

    pub fn num_workers(&self) -> usize {
        self.node.attrs.num_workers
    }

    /// Tear down the node early. Idempotent; also run by `Drop`.
    pub fn finalize(&self) {
        self.node.finalize();
    }

    // -- Jobs -------------------------------------------------------------

    pub fn job(&self, job_id: u32) -> Result<JobHandle, MtapiError> {
        self.node.job_handle(job_id)
    }

    // -- Actions ------------------------------------------------------------

    pub fn create_action(
        &self,
        job_id: u32,
        body: impl Fn(&TaskContext, &[u8], &mut [u8]) -> Result<(), MtapiError> + Send + Sync + 'static,
        attrs: ActionAttributes,
    ) -> Result<ActionHandle, MtapiError> {
        self.node.create_action(job_id, Arc::new(body), attrs)
    }

    pub fn register_plugin_action(
        &self,
        job_id: u32,
        plugin: Arc<dyn PluginAction>,
        attrs: ActionAttributes,
    ) -> Result<ActionHandle, MtapiError> {
        self.node.register_plugin_action(job_id, plugin, attrs)
    }

    pub fn delete_action(&self, action: ActionHandle, timeout: Option<Duration>) -> Result<(), MtapiError> {
        self.node.delete_action(action, timeout)
    }

    pub fn enable_action(&self, action: ActionHandle) -> Result<(), MtapiError> {
        self.node.enable_action(action)
    }

    pub fn disable_action(&self, action: ActionHandle) -> Result<(), MtapiError> {
        self.node.disable_action(action)
    }

    // -- Groups ---------------------------------------------------------------

    pub fn create_group(&self) -> Result<GroupHandle, MtapiError> {
        self.node.create_group(GroupAttributes::new())
    }

    pub fn delete_group(&self, group: GroupHandle) -> Result<(), MtapiError> {
        self.node.delete_group(group)
    }

    /// Block (re-entrantly) until one task in `group` has completed; returns
    /// its user-data tag. `GROUP_COMPLETED` once the group is drained.
    pub fn wait_any(&self, group: GroupHandle, timeout: Option<Duration>) -> Result<u64, MtapiError> {
        self.node.wait_any(group, 0, timeout).map(|(_task, tag)| tag)
    }

    /// Block (re-entrantly) until every task in `group` has completed.
    /// Returns the first non-success status observed, if any.
    pub fn wait_all(&self, group: GroupHandle, timeout: Option<Duration>) -> Result<(), MtapiError> {
        self.node.wait_all(group, 0, timeout)
    }

    // -- Queues -----------------------------------------------------------

    pub fn create_queue(
        &self,
        job_id: u32,
        attrs: QueueAttributes,
        affinity: Affinity,
    ) -> Result<QueueHandle, MtapiError> {
        self.node.create_queue(job_id, attrs, affinity)
    }

    pub fn enable_queue(&self, queue: QueueHandle) -> Result<(), MtapiError> {
        self.node.enable_queue(queue)
    }

    pub fn disable_queue(&self, queue: QueueHandle) -> Result<(), MtapiError> {
        self.node.disable_queue(queue)
    }

    pub fn delete_queue(&self, queue: QueueHandle) -> Result<(), MtapiError> {
        self.node.delete_queue(queue)
    }

    // -- Tasks ------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn start_task(
        &self,
        job_id: u32,
        args: &[u8],
        result: &mut [u8],
        attrs: TaskAttributes,
        group: Option<GroupHandle>,
        queue: Option<QueueHandle>,
    ) -> Result<TaskHandle, MtapiError> {
        self.node.start_task(job_id, args, result, attrs, group, queue)
    }

    /// Block (re-entrantly) until `task` reaches a terminal state. Idempotent
    /// on an already-terminal task.
    pub fn wait_task(&self, task: TaskHandle, timeout: Option<Duration>) -> Result<(), MtapiError> {
        self.node.wait_task(task, 0, timeout)
    }

    pub fn cancel_task(&self, task: TaskHandle) -> Result<(), MtapiError> {
        self.node.cancel_task(task)
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.node.finalize();
    }
}

//! Task execution context.
//!
//! The object an action body receives when invoked. It exposes exactly the
//! slice of task state an action is allowed to touch: whether it should
//! cooperatively cancel, its instance numbering within a multi-instance
//! task, and which worker it is running on. Actions must poll
//! [`TaskContext::should_cancel`] at reasonable intervals themselves —
//! cancellation here is cooperative, never preemptive (§5).

use mtapi_core::{MtapiError, TaskState};
use std::sync::Arc;

use crate::task::Task;

pub struct TaskContext {
    task: Arc<TaskInner>,
}

/// Data a `TaskContext` needs that isn't already reachable through the
/// pooled `Task` itself (the worker number running this instance, and the
/// instance index assigned to this particular invocation).
pub(crate) struct TaskInner {
    pub task: *const Task,
    pub worker_number: u32,
    pub instance_number: u32,
    pub num_instances: u32,
}
unsafe impl Send for TaskInner {}
unsafe impl Sync for TaskInner {}

impl TaskContext {
    pub(crate) fn new(
        task: *const Task,
        worker_number: u32,
        instance_number: u32,
        num_instances: u32,
    ) -> Self {
        TaskContext {
            task: Arc::new(TaskInner {
                task,
                worker_number,
                instance_number,
                num_instances,
            }),
        }
    }

    fn task(&self) -> &Task {
        // Safety: the worker that constructs a `TaskContext` holds the only
        // live reference to the underlying `Task` for the duration of the
        // action call (§5's single-writer-while-RUNNING invariant).
        unsafe { &*self.task.task }
    }

    /// Whether the task has been asked to cancel. Action bodies should
    /// check this periodically in long-running loops.
    pub fn should_cancel(&self) -> bool {
        self.task().cancel.is_cancelled()
    }

    pub fn current_worker_number(&self) -> u32 {
        self.task.worker_number
    }

    pub fn instance_number(&self) -> u32 {
        self.task.instance_number
    }

    pub fn num_instances(&self) -> u32 {
        self.task.num_instances
    }

    /// The task's current state, as last observed by the scheduler. An
    /// action body sees `RUNNING` for its own task while it is executing.
    pub fn task_state(&self) -> TaskState {
        self.task().state.load()
    }

    /// Record a non-success status for this task's eventual outcome. Only
    /// meaningful if called before the action returns; the scheduler reads
    /// it back when it finalizes the task (§4.4's error-propagation path).
    pub fn set_status(&self, err: MtapiError) {
        self.task().report_error(err);
    }

    /// The node this task is running on, for an action body that needs to
    /// call back into the core (§5: `StartTask`/`Wait`/`YieldToScheduler`
    /// are the sanctioned blocking operations from inside an action).
    /// Recursive spawning is the motivating case.
    pub fn node(&self) -> Option<Arc<crate::node::Node>> {
        crate::node::Node::current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobHandle;
    use crate::task::TaskAttributes;
    use mtapi_core::{Handle, TaskState};

    #[test]
    fn should_cancel_reflects_task_flag() {
        let task = Task::new(
            Handle::new(1, 0),
            JobHandle { job_id: 1, domain_id: 0 },
            std::ptr::null(),
            0,
            std::ptr::null_mut(),
            0,
            TaskAttributes::default(),
            None,
            None,
        );
        let ctx = TaskContext::new(&task as *const Task, 0, 0, 1);
        assert!(!ctx.should_cancel());
        task.cancel.cancel();
        assert!(ctx.should_cancel());
    }

    #[test]
    fn instance_numbering_is_exposed() {
        let task = Task::new(
            Handle::new(2, 0),
            JobHandle { job_id: 1, domain_id: 0 },
            std::ptr::null(),
            0,
            std::ptr::null_mut(),
            0,
            TaskAttributes::default(),
            None,
            None,
        );
        let ctx = TaskContext::new(&task as *const Task, 3, 2, 5);
        assert_eq!(ctx.current_worker_number(), 3);
        assert_eq!(ctx.instance_number(), 2);
        assert_eq!(ctx.num_instances(), 5);
    }

    #[test]
    fn task_state_reflects_transitions() {
        let task = Task::new(
            Handle::new(3, 0),
            JobHandle { job_id: 1, domain_id: 0 },
            std::ptr::null(),
            0,
            std::ptr::null_mut(),
            0,
            TaskAttributes::default(),
            None,
            None,
        );
        let ctx = TaskContext::new(&task as *const Task, 0, 0, 1);
        assert_eq!(ctx.task_state(), TaskState::Created);
        task.state.store(TaskState::Running);
        assert_eq!(ctx.task_state(), TaskState::Running);
    }
}

//! Scheduling loop (§4.3).
//!
//! Dispatch is synchronous-to-completion: a worker pops a task, runs its
//! action body in full (no context switch, no yield-and-resume), reports
//! the outcome, and loops. `Wait`/`WaitAny`/`WaitAll` are re-entrant: a
//! thread blocked in one of them runs the scheduler loop itself instead of
//! sleeping, so a single-worker node still makes progress when the main
//! thread waits on a task it spawned (mirrors the reference runtime's
//! "queue scheduler" wait strategy rather than a plain park).

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::action::ActionBody;
use crate::context::TaskContext;
use crate::error::{MtapiError, TaskOutcome};
use crate::node::Node;
use crate::run_queue::RunQueues;
use crate::task::TaskHandle;
use crate::worker::WorkerContext;

pub struct Scheduler {
    pub run_queues: RunQueues,
}

impl Scheduler {
    pub fn new(num_workers: usize, num_priorities: usize) -> Self {
        Scheduler {
            run_queues: RunQueues::new(num_workers, num_priorities),
        }
    }

    /// Enqueue `task` for dispatch on `node`. Honors affinity by picking a
    /// worker from the task's (or its action's) allowed set, private queue
    /// if the set names exactly one worker, shared queue otherwise so other
    /// eligible workers can steal it. `worker_hint` is used verbatim for the
    /// shared-queue case (the caller already restricted it to a legal
    /// worker); for the single-worker-affinity case the actual dispatch
    /// worker is re-derived from the affinity mask's own set bit so a stale
    /// or mismatched hint can never strand a strictly-affine task on a
    /// worker that will never run it.
    pub fn enqueue(&self, node: &Node, task: TaskHandle, worker_hint: usize, priority: u8) {
        let affinity = node
            .tasks
            .with(task, |t| t.attrs.affinity)
            .flatten()
            .unwrap_or_else(|| mtapi_core::Affinity::all(self.run_queues.num_workers()));

        if affinity.count() == 1 {
            let worker = affinity.iter().next().map(|w| w as usize).unwrap_or(worker_hint);
            self.run_queues.push_private(worker, task);
            node.wake_one(worker);
        } else {
            self.run_queues.push_shared(worker_hint, priority, task);
            node.wake_one(worker_hint);
        }
    }

    /// Run exactly one task to completion if one is available for
    /// `worker`, either from its own queues or stolen from another
    /// worker's shared queue. Returns `true` if a task was run.
    pub fn run_one(&self, node: &Node, worker: usize) -> bool {
        let pinned = node.worker_pinned_priority(worker);
        let task = self
            .run_queues
            .pop_own(worker, pinned)
            .or_else(|| self.run_queues.steal(worker, pinned));
        let Some(task) = task else { return false };
        self.execute(node, task, worker);
        true
    }

    fn execute(&self, node: &Node, handle: TaskHandle, worker: usize) {
        let action_handle = node.tasks.with(handle, |t| t.action).flatten();
        let is_plugin = action_handle
            .and_then(|a| node.actions.with(a, |act| matches!(act.body, ActionBody::Plugin(_))))
            .unwrap_or(false);

        if is_plugin {
            self.execute_plugin(node, handle, action_handle.unwrap());
            return;
        }

        if !node.try_mark_running(handle) {
            return;
        }

        if let Some(outcome) = self.invoke_action(node, handle, worker) {
            node.finish_task(handle, outcome);
        }
    }

    /// Plugin-backed actions own their own `SCHEDULED -> RUNNING ->
    /// terminal` transitions through `CoreCallback`; the scheduler only
    /// hands the task off via `start` and steps aside (§6's plugin hook).
    fn execute_plugin(&self, node: &Node, handle: TaskHandle, action_handle: crate::action::ActionHandle) {
        if node.tasks.with(handle, |t| t.cancel.is_cancelled()).unwrap_or(true) {
            node.finish_task(handle, TaskOutcome::Cancelled);
            return;
        }
        let plugin = node
            .actions
            .with(action_handle, |act| match &act.body {
                ActionBody::Plugin(p) => Some(std::sync::Arc::clone(p)),
                ActionBody::Local(_) => None,
            })
            .flatten();
        match plugin {
            Some(p) => p.start(handle, node),
            None => node.finish_task(handle, TaskOutcome::Failed(MtapiError::ActionInvalid)),
        }
    }

    /// Claim and run exactly one instance of a multi-instance task (§4.3/§4.4:
    /// instances are independently schedulable units, distributed across the
    /// legal worker set by `Node::dispatch` rather than run back-to-back on
    /// whichever worker happened to dequeue the task). Returns `None` while
    /// other instances remain outstanding; only the instance that decrements
    /// `instances_todo` to zero finalizes the task and gets a `TaskOutcome`
    /// back.
    fn invoke_action(&self, node: &Node, handle: TaskHandle, worker: usize) -> Option<TaskOutcome> {
        let num_instances = node
            .tasks
            .with(handle, |t| t.attrs.num_instances)
            .unwrap_or(1);
        let instance = node
            .tasks
            .with(handle, |t| t.current_instance.fetch_add(1, Ordering::AcqRel))
            .unwrap_or(0);

        if instance < num_instances {
            let cancelled = node.tasks.with(handle, |t| t.cancel.is_cancelled()).unwrap_or(true);
            if !cancelled {
                self.run_instance(node, handle, worker, instance, num_instances);
            }
        }

        let last = node.tasks.with(handle, |t| t.instance_completed()).unwrap_or(true);
        if !last {
            return None;
        }

        if node.tasks.with(handle, |t| t.cancel.is_cancelled()).unwrap_or(false) {
            return Some(TaskOutcome::Cancelled);
        }
        if let Some(Some(err)) = node.tasks.with(handle, |t| t.take_reported_error()) {
            return Some(TaskOutcome::Failed(err));
        }
        Some(TaskOutcome::Success)
    }

    /// Run a single instance's action body, recording any failure on the
    /// task via `report_error` so the last-decrementer call in
    /// `invoke_action` can surface it.
    fn run_instance(&self, node: &Node, handle: TaskHandle, worker: usize, instance: u32, num_instances: u32) {
        let action_handle = match node.tasks.with(handle, |t| t.action) {
            Some(Some(a)) => a,
            _ => {
                node.tasks.with(handle, |t| t.report_error(MtapiError::ActionInvalid));
                return;
            }
        };

        let result = node.actions.with(action_handle, |action| {
            node.tasks.with(handle, |task| {
                let ctx = TaskContext::new(task as *const _, worker as u32, instance, num_instances);
                let (args_ptr, args_len, result_ptr, result_len) = unsafe {
                    let args = task.args();
                    let result = task.result_mut();
                    (args.as_ptr(), args.len(), result.as_mut_ptr(), result.len())
                };
                match &action.body {
                    ActionBody::Local(f) => {
                        let args = unsafe { std::slice::from_raw_parts(args_ptr, args_len) };
                        let result = unsafe { std::slice::from_raw_parts_mut(result_ptr, result_len) };
                        f(&ctx, args, result)
                    }
                    ActionBody::Plugin(_) => unreachable!("plugin actions are dispatched by execute_plugin"),
                }
            })
        });

        match result {
            Some(Some(Err(e))) => {
                node.tasks.with(handle, |t| t.report_error(e));
            }
            Some(None) => {
                node.tasks.with(handle, |t| t.report_error(MtapiError::TaskInvalid));
            }
            None => {
                node.tasks.with(handle, |t| t.report_error(MtapiError::ActionInvalid));
            }
            Some(Some(Ok(()))) => {}
        }
    }

    /// Re-entrant wait: keep running other ready tasks on this thread until
    /// `is_done` reports true or `timeout` elapses.
    pub fn wait_until(&self, node: &Node, worker: usize, is_done: impl Fn() -> bool, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|d| std::time::Instant::now() + d);
        loop {
            if is_done() {
                return true;
            }
            if let Some(dl) = deadline {
                if std::time::Instant::now() >= dl {
                    return false;
                }
            }
            if !self.run_one(node, worker) {
                std::thread::yield_now();
            }
        }
    }

    /// The loop each worker OS thread runs until shutdown.
    pub fn worker_loop(&self, node: &Node, ctx: Arc<WorkerContext>) {
        crate::worker::set_current_worker_id(ctx.index);
        while !node.is_shutting_down() {
            if self.run_one(node, ctx.index) {
                continue;
            }
            ctx.park(|| node.is_shutting_down() || self.has_work_for(ctx.index));
        }
    }

    fn has_work_for(&self, _worker: usize) -> bool {
        self.run_queues.total_len() > 0
    }
}

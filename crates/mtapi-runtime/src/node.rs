//! The node: the runtime's single point of entry (§3, §4.1).
//!
//! Mirrors the reference runtime's `mtapi_initialize`/`mtapi_finalize`
//! process-wide singleton, but expressed as an `Arc<Node>` handed back to
//! the caller rather than a hidden global — the facade crate (`mtapi`)
//! wraps it in a `Drop`-based `Runtime` for the ergonomic global-singleton
//! feel without a bare `static` `Node` ever being directly reachable from
//! here.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use mtapi_core::{Affinity, Pool, TaskState};

use crate::action::{Action, ActionAttributes, ActionBody, ActionFn, ActionHandle};
use crate::config::NodeAttributes;
use crate::error::{MtapiError, TaskOutcome};
use crate::group::{Group, GroupAttributes, GroupHandle};
use crate::job::{Job, JobHandle};
use crate::plugin::{CoreCallback, PluginAction};
use crate::queue::{Queue, QueueAttributes, QueueHandle};
use crate::scheduler::Scheduler;
use crate::task::{Task, TaskAttributes, TaskHandle};
use crate::worker::WorkerPool;
use std::sync::Arc;

static CURRENT_NODE: OnceLock<Mutex<Option<Arc<Node>>>> = OnceLock::new();

fn slot() -> &'static Mutex<Option<Arc<Node>>> {
    CURRENT_NODE.get_or_init(|| Mutex::new(None))
}

pub struct Node {
    pub attrs: NodeAttributes,
    pub domain_id: u16,
    pub actions: Pool<Action>,
    pub tasks: Pool<Task>,
    pub groups: Pool<Group>,
    pub queues: Pool<Queue>,
    jobs: Vec<Mutex<Job>>,
    pub scheduler: Scheduler,
    workers: Mutex<Option<WorkerPool>>,
    shutting_down: AtomicBool,
    next_worker: AtomicUsize,
}

impl Node {
    /// Bring up the single process-wide node. Fails with `NodeInitialized`
    /// if one is already active (§4.1).
    pub fn initialize(attrs: NodeAttributes, domain_id: u16) -> Result<Arc<Node>, MtapiError> {
        mtapi_core::log::init();
        attrs.validate().map_err(|_| MtapiError::Parameter)?;

        let mut guard = slot().lock().unwrap();
        if guard.is_some() {
            return Err(MtapiError::NodeInitialized);
        }

        let jobs = (0..attrs.max_jobs)
            .map(|_| Mutex::new(Job::new(attrs.max_actions)))
            .collect();

        let node = Arc::new(Node {
            actions: Pool::new(attrs.max_actions as u32),
            tasks: Pool::new(attrs.max_tasks as u32),
            groups: Pool::new(attrs.max_groups as u32),
            queues: Pool::new(attrs.max_queues as u32),
            jobs,
            scheduler: Scheduler::new(attrs.num_workers, attrs.num_priorities),
            workers: Mutex::new(None),
            shutting_down: AtomicBool::new(false),
            next_worker: AtomicUsize::new(0),
            attrs,
            domain_id,
        });

        let mut pool = WorkerPool::new(node.attrs.num_workers, &node.attrs.worker_priorities);
        {
            let node_for_workers = Arc::clone(&node);
            pool.start(node.attrs.reuse_main_thread, move |ctx| {
                node_for_workers.scheduler.worker_loop(&node_for_workers, ctx);
            });
        }
        *node.workers.lock().unwrap() = Some(pool);

        log_info_started(&node);
        *guard = Some(Arc::clone(&node));
        Ok(node)
    }

    pub fn current() -> Option<Arc<Node>> {
        slot().lock().unwrap().clone()
    }

    /// Tear down the node: signal shutdown, join every worker thread, and
    /// clear the singleton slot so `initialize` can be called again.
    pub fn finalize(&self) {
        self.shutting_down.store(true, Ordering::Release);
        if let Some(pool) = self.workers.lock().unwrap().take() {
            pool.shutdown();
            pool.join();
        }
        *slot().lock().unwrap() = None;
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    pub fn wake_one(&self, worker: usize) {
        if let Some(pool) = self.workers.lock().unwrap().as_ref() {
            pool.context(worker % pool.num_workers()).wake();
        }
    }

    /// Round-robin among only the workers legal under `affinity` (§4.3: the
    /// scheduler must pick from the affinity-intersected set, not any
    /// worker). `affinity` is assumed non-empty and within `[0,
    /// num_workers)` — callers validate that before reaching here.
    fn pick_worker_for(&self, affinity: Affinity) -> usize {
        let n = self.attrs.num_workers;
        let start = self.next_worker.fetch_add(1, Ordering::Relaxed);
        for i in 0..n {
            let w = (start + i) % n;
            if affinity.is_set(w as u32) {
                return w;
            }
        }
        start % n
    }

    /// The priority a worker is pinned to, if any
    /// (`NodeAttributes::worker_priority`), for the scheduler's dispatch
    /// filter.
    pub fn worker_pinned_priority(&self, worker: usize) -> Option<u8> {
        self.workers
            .lock()
            .unwrap()
            .as_ref()
            .filter(|p| worker < p.num_workers())
            .and_then(|p| p.context(worker).pinned_priority)
    }

    // -- Jobs -----------------------------------------------------------

    pub fn job_handle(&self, job_id: u32) -> Result<JobHandle, MtapiError> {
        if job_id == 0 || (job_id as usize) > self.jobs.len() {
            return Err(MtapiError::JobInvalid);
        }
        Ok(JobHandle {
            job_id,
            domain_id: self.domain_id,
        })
    }

    // -- Actions ----------------------------------------------------------

    pub fn create_action(
        &self,
        job_id: u32,
        body: ActionFn,
        attrs: ActionAttributes,
    ) -> Result<ActionHandle, MtapiError> {
        self.create_action_body(job_id, ActionBody::Local(body), attrs)
    }

    pub fn create_plugin_action(
        &self,
        job_id: u32,
        plugin: Arc<dyn PluginAction>,
        attrs: ActionAttributes,
    ) -> Result<ActionHandle, MtapiError> {
        self.create_action_body(job_id, ActionBody::Plugin(plugin), attrs)
    }

    fn create_action_body(
        &self,
        job_id: u32,
        body: ActionBody,
        attrs: ActionAttributes,
    ) -> Result<ActionHandle, MtapiError> {
        let job_handle = self.job_handle(job_id)?;
        let handle = self
            .actions
            .allocate_with(|h| Action::new(h, job_id, body, attrs))
            .ok_or(MtapiError::ActionLimit)?;

        let mut job = self.jobs[(job_handle.job_id - 1) as usize].lock().unwrap();
        if !job.add_action(handle) {
            drop(job);
            self.actions.deallocate(handle);
            return Err(MtapiError::ActionLimit);
        }
        Ok(handle)
    }

    pub fn delete_action(&self, handle: ActionHandle, timeout: Option<Duration>) -> Result<(), MtapiError> {
        let job_id = self
            .actions
            .with(handle, |a| a.job_id)
            .ok_or(MtapiError::ActionInvalid)?;
        self.actions.with(handle, |a| a.disable());

        let deadline = timeout.map(|d| std::time::Instant::now() + d);
        loop {
            let in_flight = self.actions.with(handle, |a| a.load()).unwrap_or(0);
            if in_flight == 0 {
                break;
            }
            if let Some(dl) = deadline {
                if std::time::Instant::now() >= dl {
                    return Err(MtapiError::Timeout);
                }
            }
            std::thread::yield_now();
        }

        if let Some(mut job) = self.jobs.get((job_id - 1) as usize).map(|m| m.lock().unwrap()) {
            job.remove_action(handle);
        }

        let plugin = self
            .actions
            .with(handle, |a| match &a.body {
                ActionBody::Plugin(p) => Some(Arc::clone(p)),
                ActionBody::Local(_) => None,
            })
            .flatten();
        if let Some(plugin) = plugin {
            plugin.finalize();
        }

        self.actions.deallocate(handle);
        Ok(())
    }

    pub fn enable_action(&self, handle: ActionHandle) -> Result<(), MtapiError> {
        self.actions
            .with(handle, |a| a.enable())
            .ok_or(MtapiError::ActionInvalid)
    }

    pub fn disable_action(&self, handle: ActionHandle) -> Result<(), MtapiError> {
        self.actions
            .with(handle, |a| a.disable())
            .ok_or(MtapiError::ActionInvalid)
    }

    fn select_action(&self, job_id: u32, requested_affinity: Affinity) -> Result<ActionHandle, MtapiError> {
        let job_handle = self.job_handle(job_id)?;
        let job = self.jobs[(job_handle.job_id - 1) as usize].lock().unwrap();
        let mut best: Option<(ActionHandle, usize)> = None;
        for &candidate in &job.actions {
            let eligible = self.actions.with(candidate, |a| {
                (a.is_enabled() && a.matches_affinity(requested_affinity)).then(|| a.load())
            });
            let Some(Some(load)) = eligible else { continue };
            if best.map_or(true, |(_, best_load)| load < best_load) {
                best = Some((candidate, load));
            }
        }
        best.map(|(h, _)| h).ok_or(MtapiError::ActionInvalid)
    }

    // -- Groups -------------------------------------------------------------

    pub fn create_group(&self, _attrs: GroupAttributes) -> Result<GroupHandle, MtapiError> {
        self.groups
            .allocate_with(Group::new)
            .ok_or(MtapiError::GroupLimit)
    }

    pub fn delete_group(&self, handle: GroupHandle) -> Result<(), MtapiError> {
        self.groups.deallocate(handle).map(|_| ()).ok_or(MtapiError::GroupInvalid)
    }

    pub fn wait_any(&self, group: GroupHandle, worker: usize, timeout: Option<Duration>) -> Result<(TaskHandle, u64), MtapiError> {
        let deadline = timeout.map(|d| std::time::Instant::now() + d);
        loop {
            let popped = self
                .groups
                .with(group, |g| g.pop_completed())
                .ok_or(MtapiError::GroupInvalid)?;
            if let Some((t, tag, res)) = popped {
                return res.map(|_| (t, tag));
            }
            let pending = self.groups.with(group, |g| g.pending_count()).unwrap_or(0);
            if pending == 0 {
                return Err(MtapiError::GroupCompleted);
            }
            if let Some(dl) = deadline {
                if std::time::Instant::now() >= dl {
                    return Err(MtapiError::Timeout);
                }
            }
            if !self.scheduler.run_one(self, worker) {
                std::thread::yield_now();
            }
        }
    }

    pub fn wait_all(&self, group: GroupHandle, worker: usize, timeout: Option<Duration>) -> Result<(), MtapiError> {
        let done = || self.groups.with(group, |g| g.pending_count()).unwrap_or(0) == 0;
        if !self.scheduler.wait_until(self, worker, done, timeout) {
            return Err(MtapiError::Timeout);
        }
        self.groups
            .with(group, |g| g.drain_result())
            .ok_or(MtapiError::GroupInvalid)?
    }

    // -- Queues ---------------------------------------------------------

    pub fn create_queue(&self, job_id: u32, attrs: QueueAttributes, affinity: Affinity) -> Result<QueueHandle, MtapiError> {
        let job_handle = self.job_handle(job_id)?;
        self.queues
            .allocate_with(|h| Queue::new(h, job_handle, attrs, affinity))
            .ok_or(MtapiError::QueueLimit)
    }

    /// Re-enable the queue and promote retained tasks back to `SCHEDULED`
    /// (§4.4's `RETAINED -> SCHEDULED` transition "upon queue enable").
    pub fn enable_queue(&self, handle: QueueHandle) -> Result<(), MtapiError> {
        self.queues.with(handle, |q| q.enable()).ok_or(MtapiError::QueueInvalid)?;
        self.try_promote_retained(handle);
        Ok(())
    }

    /// Atomically clear the enabled flag, mark every task already admitted
    /// (SCHEDULED or RUNNING) for cooperative cancellation via the same
    /// mechanism `CancelTask` uses, then — unless the queue retains
    /// completions — cancel every task still sitting in the retention
    /// buffer without ever running it (§4.6: "running tasks are marked for
    /// cancellation; they are not preempted").
    pub fn disable_queue(&self, handle: QueueHandle) -> Result<(), MtapiError> {
        self.queues.with(handle, |q| q.disable()).ok_or(MtapiError::QueueInvalid)?;

        let in_flight = self.queues.with(handle, |q| q.in_flight_snapshot()).unwrap_or_default();
        for task in in_flight {
            let _ = self.cancel_task(task);
        }

        let retain = self.queues.with(handle, |q| q.attrs.retain).unwrap_or(true);
        if retain {
            return Ok(());
        }
        loop {
            let popped = self
                .queues
                .with(handle, |q| q.retained.pop_front(|h| self.tasks.with(h, |t| t.next).flatten()))
                .flatten();
            let Some(task) = popped else { break };
            self.finish_task(task, TaskOutcome::Cancelled);
        }
        Ok(())
    }

    /// Promote retained tasks to `SCHEDULED` while the queue remains able
    /// to admit them: ordered queues promote one at a time (the next comes
    /// from that task's completion notification); unordered queues drain
    /// the whole backlog at once.
    fn try_promote_retained(&self, qh: QueueHandle) {
        loop {
            let empty = self.queues.with(qh, |q| q.retained.is_empty()).unwrap_or(true);
            if empty {
                break;
            }
            let admitted = self.queues.with(qh, |q| q.admit()).unwrap_or(false);
            if !admitted {
                break;
            }
            let popped = self
                .queues
                .with(qh, |q| q.retained.pop_front(|h| self.tasks.with(h, |t| t.next).flatten()))
                .flatten();
            let Some(task) = popped else {
                // Retained list emptied concurrently between the check and
                // `admit()`; give the slot back.
                self.queues.with(qh, |q| q.on_task_finished());
                break;
            };
            self.tasks.with(task, |t| t.state.store(TaskState::Scheduled));
            let priority = self.tasks.with(task, |t| t.attrs.priority).unwrap_or(0);
            self.queues.with(qh, |q| q.track_in_flight(task));
            self.dispatch(task, priority);
            let ordered = self.queues.with(qh, |q| q.attrs.ordered).unwrap_or(true);
            if ordered {
                break;
            }
        }
    }

    /// Enqueue every instance of `task` (one per `TaskAttributes::num_instances`,
    /// defaulting to one) across the legal worker set, so instances become
    /// independently schedulable units rather than a sequential loop inside
    /// one worker's `execute()` call (§4.3/§4.4).
    fn dispatch(&self, task: TaskHandle, priority: u8) {
        let affinity = self
            .tasks
            .with(task, |t| t.attrs.affinity)
            .flatten()
            .unwrap_or_else(|| Affinity::all(self.attrs.num_workers));
        let num_instances = self
            .tasks
            .with(task, |t| t.attrs.num_instances)
            .unwrap_or(1)
            .max(1);
        for _ in 0..num_instances {
            let worker = self.pick_worker_for(affinity);
            self.scheduler.enqueue(self, task, worker, priority);
        }
    }

    pub fn delete_queue(&self, handle: QueueHandle) -> Result<(), MtapiError> {
        self.disable_queue(handle)?;
        self.queues.deallocate(handle).map(|_| ()).ok_or(MtapiError::QueueInvalid)
    }

    // -- Tasks ------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn start_task(
        &self,
        job_id: u32,
        args: &[u8],
        result: &mut [u8],
        mut attrs: TaskAttributes,
        group: Option<GroupHandle>,
        queue: Option<QueueHandle>,
    ) -> Result<TaskHandle, MtapiError> {
        let job_handle = self.job_handle(job_id)?;

        if let Some(a) = attrs.affinity {
            if a.iter().any(|w| w as usize >= self.attrs.num_workers) {
                return Err(MtapiError::CoreNum);
            }
        }

        let mut requested_affinity = attrs
            .affinity
            .unwrap_or_else(|| Affinity::all(self.attrs.num_workers));
        if let Some(qh) = queue {
            let queue_affinity = self.queues.with(qh, |q| q.affinity).ok_or(MtapiError::QueueInvalid)?;
            requested_affinity = requested_affinity.intersection(queue_affinity);
        }
        if requested_affinity.is_empty() {
            return Err(MtapiError::Affinity);
        }
        attrs.affinity = Some(requested_affinity);

        if let Some(qh) = queue {
            if !self.queues.with(qh, |q| q.try_reserve()).ok_or(MtapiError::QueueInvalid)? {
                return Err(MtapiError::QueueLimit);
            }
        }

        let action = match self.select_action(job_id, requested_affinity) {
            Ok(a) => a,
            Err(e) => {
                if let Some(qh) = queue {
                    self.queues.with(qh, |q| q.release());
                }
                return Err(e);
            }
        };

        let handle = self
            .tasks
            .allocate_with(|h| {
                let mut task = Task::new(
                    h,
                    job_handle,
                    args.as_ptr(),
                    args.len(),
                    result.as_mut_ptr(),
                    result.len(),
                    attrs,
                    group,
                    queue,
                );
                task.action = Some(action);
                task
            })
            .ok_or_else(|| {
                if let Some(qh) = queue {
                    self.queues.with(qh, |q| q.release());
                }
                MtapiError::TaskLimit
            })?;

        self.actions.with(action, |a| a.acquire());
        if let Some(gh) = group {
            self.groups.with(gh, |g| g.task_added());
        }

        let admitted = match queue {
            Some(qh) => self.queues.with(qh, |q| q.admit()).unwrap_or(false),
            None => true,
        };

        if admitted {
            self.tasks.with(handle, |t| t.state.store(TaskState::Scheduled));
            let priority = self.tasks.with(handle, |t| t.attrs.priority).unwrap_or(0);
            if let Some(qh) = queue {
                self.queues.with(qh, |q| q.track_in_flight(handle));
            }
            self.dispatch(handle, priority);
        } else if let Some(qh) = queue {
            self.tasks.with(handle, |t| t.state.store(TaskState::Retained));
            self.queues.with(qh, |q| {
                q.retained.push_back(handle, |h, next| {
                    self.tasks.with_mut(h, |t| t.next = next);
                })
            });
        }
        Ok(handle)
    }

    pub fn try_mark_running(&self, handle: TaskHandle) -> bool {
        self.tasks
            .with(handle, |t| t.state.try_transition(TaskState::Scheduled, TaskState::Running) || t.state.load() == TaskState::Running)
            .unwrap_or(false)
    }

    pub fn cancel_task(&self, handle: TaskHandle) -> Result<(), MtapiError> {
        self.tasks.with(handle, |t| t.cancel.cancel()).ok_or(MtapiError::TaskInvalid)?;
        let action = self.tasks.with(handle, |t| t.action).flatten();
        if let Some(a) = action {
            let plugin = self
                .actions
                .with(a, |act| match &act.body {
                    ActionBody::Plugin(p) => Some(Arc::clone(p)),
                    ActionBody::Local(_) => None,
                })
                .flatten();
            if let Some(plugin) = plugin {
                plugin.cancel(handle);
            }
        }
        Ok(())
    }

    pub fn wait_task(&self, handle: TaskHandle, worker: usize, timeout: Option<Duration>) -> Result<(), MtapiError> {
        let done = || {
            self.tasks
                .with(handle, |t| t.state.load().is_terminal())
                .unwrap_or(true)
        };
        if !self.scheduler.wait_until(self, worker, done, timeout) {
            return Err(MtapiError::Timeout);
        }
        self.tasks
            .with(handle, |t| t.outcome())
            .flatten()
            .map(|o| o.into_result())
            .unwrap_or(Ok(()))
    }

    /// Called by the scheduler (and by plugin `CoreCallback::complete`)
    /// once a task's action body has finished.
    pub fn finish_task(&self, handle: TaskHandle, outcome: TaskOutcome) {
        let terminal = match outcome {
            TaskOutcome::Success => TaskState::Completed,
            TaskOutcome::Cancelled => TaskState::Cancelled,
            TaskOutcome::Failed(_) => TaskState::Error,
        };
        self.tasks.with(handle, |t| {
            t.state.store(terminal);
            t.set_outcome(outcome);
        });

        let (action, group, queue, complete_func, user_data) = self
            .tasks
            .with(handle, |t| {
                (
                    t.action,
                    t.group,
                    t.queue,
                    t.attrs.complete_func.clone(),
                    t.attrs.user_data,
                )
            })
            .unwrap_or((None, None, None, None, 0));

        if let Some(a) = action {
            self.actions.with(a, |a| a.release());
        }
        if let Some(qh) = queue {
            self.queues.with(qh, |q| q.untrack_in_flight(handle));
            self.queues.with(qh, |q| q.release());
            self.queues.with(qh, |q| q.on_task_finished());
            self.try_promote_retained(qh);
        }
        if let Some(gh) = group {
            self.groups
                .with(gh, |g| g.task_completed(handle, user_data, outcome.into_result()));
        }
        if let Some(f) = complete_func {
            f(handle, outcome);
        }

        if self.tasks.with(handle, |t| t.attrs.detached).unwrap_or(false) {
            self.tasks.deallocate(handle);
        }
    }

    pub fn register_plugin_action(
        &self,
        job_id: u32,
        plugin: Arc<dyn PluginAction>,
        attrs: ActionAttributes,
    ) -> Result<ActionHandle, MtapiError> {
        self.create_plugin_action(job_id, plugin, attrs)
    }
}

impl CoreCallback for Node {
    fn mark_running(&self, task: TaskHandle) -> bool {
        self.try_mark_running(task)
    }

    fn complete(&self, task: TaskHandle, outcome: TaskOutcome) {
        self.finish_task(task, outcome);
    }
}

fn log_info_started(node: &Node) {
    mtapi_core::log_info!(
        "node initialized: {} workers, {} priorities, domain {}",
        node.attrs.num_workers,
        node.attrs.num_priorities,
        node.domain_id
    );
}

//! Job queues (§4.6).
//!
//! A queue funnels tasks spawned against it through a single job, enforcing
//! an optional depth limit, an optional strict in-order execution policy,
//! and optional retention of completed tasks for later inspection. Default
//! values and the recognized attribute set are taken verbatim from
//! `mtapi_queueattr_init`/`_set`.

use mtapi_core::Affinity;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::job::JobHandle;
use crate::retained::RetainedList;
use crate::task::TaskHandle;

pub type QueueHandle = mtapi_core::Handle<Queue>;

#[derive(Debug, Clone)]
pub struct QueueAttributes {
    pub global: bool,
    pub priority: u8,
    pub limit: usize,
    pub ordered: bool,
    pub retain: bool,
    pub domain_shared: bool,
}

impl QueueAttributes {
    /// `mtapi_queueattr_init` defaults, with `limit` taken from the node's
    /// configured `queue_limit` (the reference runtime does the same:
    /// `node->queue_limit` at init time).
    pub fn new(queue_limit: usize) -> Self {
        QueueAttributes {
            global: true,
            priority: 0,
            limit: queue_limit,
            ordered: true,
            retain: false,
            domain_shared: true,
        }
    }

    pub fn global(mut self, v: bool) -> Self {
        self.global = v;
        self
    }
    pub fn priority(mut self, p: u8) -> Self {
        self.priority = p;
        self
    }
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = n;
        self
    }
    pub fn ordered(mut self, v: bool) -> Self {
        self.ordered = v;
        self
    }
    pub fn retain(mut self, v: bool) -> Self {
        self.retain = v;
        self
    }
    pub fn domain_shared(mut self, v: bool) -> Self {
        self.domain_shared = v;
        self
    }
}

pub struct Queue {
    pub handle: QueueHandle,
    pub job: JobHandle,
    pub attrs: QueueAttributes,
    pub affinity: Affinity,
    enabled: AtomicBool,
    num_tasks: AtomicUsize,
    /// Serializes dispatch for an ordered queue: a new task may only start
    /// once the previously-started one has begun running (§4.6's ordering
    /// guarantee is about start order, not completion order).
    ordered_executing: AtomicBool,
    pub retained: RetainedList,
    /// Tasks currently admitted and not yet terminal (SCHEDULED/RUNNING),
    /// so `disable_queue` has something concrete to cancel besides the
    /// retention buffer (§4.6).
    in_flight: Mutex<Vec<TaskHandle>>,
}

impl Queue {
    pub fn new(handle: QueueHandle, job: JobHandle, attrs: QueueAttributes, affinity: Affinity) -> Self {
        Queue {
            handle,
            job,
            attrs,
            affinity,
            enabled: AtomicBool::new(true),
            num_tasks: AtomicUsize::new(0),
            ordered_executing: AtomicBool::new(false),
            retained: RetainedList::new(),
            in_flight: Mutex::new(Vec::new()),
        }
    }

    /// Record `task` as admitted and dispatched through this queue.
    pub fn track_in_flight(&self, task: TaskHandle) {
        self.in_flight.lock().unwrap().push(task);
    }

    /// Stop tracking `task` once it reaches a terminal state.
    pub fn untrack_in_flight(&self, task: TaskHandle) {
        let mut v = self.in_flight.lock().unwrap();
        if let Some(pos) = v.iter().position(|&h| h == task) {
            v.swap_remove(pos);
        }
    }

    /// Snapshot of tasks currently admitted and not yet terminal.
    pub fn in_flight_snapshot(&self) -> Vec<TaskHandle> {
        self.in_flight.lock().unwrap().clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn depth(&self) -> usize {
        self.num_tasks.load(Ordering::Acquire)
    }

    /// Reserve a slot for a new task, honoring the configured depth limit
    /// (`limit == 0` means unbounded, per the reference runtime's
    /// convention).
    pub fn try_reserve(&self) -> bool {
        if self.attrs.limit == 0 {
            self.num_tasks.fetch_add(1, Ordering::AcqRel);
            return true;
        }
        loop {
            let cur = self.num_tasks.load(Ordering::Acquire);
            if cur >= self.attrs.limit {
                return false;
            }
            if self
                .num_tasks
                .compare_exchange(cur, cur + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }

    pub fn release(&self) {
        self.num_tasks.fetch_sub(1, Ordering::AcqRel);
    }

    /// For ordered queues: attempt to become the one task allowed to start.
    /// Returns `false` if another task is already executing and this one
    /// must wait.
    pub fn try_start_ordered(&self) -> bool {
        if !self.attrs.ordered {
            return true;
        }
        self.ordered_executing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn finish_ordered(&self) {
        if self.attrs.ordered {
            self.ordered_executing.store(false, Ordering::Release);
        }
    }

    /// Decide, at spawn time, whether a new task may be dispatched
    /// immediately or must go to the retention buffer (§4.6: disabled, or
    /// ordered-and-busy).
    pub fn admit(&self) -> bool {
        self.is_enabled() && self.try_start_ordered()
    }

    /// Called once an admitted task reaches a terminal state, freeing the
    /// ordered slot for the next retained task (if any).
    pub fn on_task_finished(&self) {
        self.finish_ordered();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtapi_core::Handle;

    fn job() -> JobHandle {
        JobHandle { job_id: 1, domain_id: 0 }
    }

    #[test]
    fn defaults_match_reference_runtime() {
        let attrs = QueueAttributes::new(16);
        assert!(attrs.global);
        assert_eq!(attrs.priority, 0);
        assert_eq!(attrs.limit, 16);
        assert!(attrs.ordered);
        assert!(!attrs.retain);
        assert!(attrs.domain_shared);
    }

    #[test]
    fn reserve_enforces_limit() {
        let q = Queue::new(Handle::new(1, 0), job(), QueueAttributes::new(2), Affinity::all(4));
        assert!(q.try_reserve());
        assert!(q.try_reserve());
        assert!(!q.try_reserve());
        q.release();
        assert!(q.try_reserve());
    }

    #[test]
    fn unbounded_when_limit_zero() {
        let q = Queue::new(Handle::new(2, 0), job(), QueueAttributes::new(0), Affinity::all(4));
        for _ in 0..100 {
            assert!(q.try_reserve());
        }
    }

    #[test]
    fn ordered_queue_serializes_starts() {
        let q = Queue::new(Handle::new(3, 0), job(), QueueAttributes::new(4), Affinity::all(4));
        assert!(q.try_start_ordered());
        assert!(!q.try_start_ordered());
        q.finish_ordered();
        assert!(q.try_start_ordered());
    }

    #[test]
    fn unordered_queue_never_blocks_starts() {
        let q = Queue::new(
            Handle::new(4, 0),
            job(),
            QueueAttributes::new(4).ordered(false),
            Affinity::all(4),
        );
        assert!(q.try_start_ordered());
        assert!(q.try_start_ordered());
    }
}

//! Worker run queues (§4.3).
//!
//! Each worker owns one FIFO per priority level plus a private queue that no
//! other worker may steal from (used for tasks explicitly pinned to that
//! worker via affinity). Priority is strict and numerically inverted (lower
//! number = higher priority, per the reference convention): dequeue order
//! for a worker's own loop is private queue first, then its per-priority
//! shared queues from priority 0 upward. An idle worker that finds nothing
//! of its own scans other workers' shared queues (never their private ones)
//! in the same priority order, starting just past its own index so repeated
//! steals fan out instead of hammering worker 0.

use std::collections::VecDeque;

use mtapi_core::SpinLock;

use crate::task::TaskHandle;

struct WorkerQueues {
    /// Indexed `[priority]`, priority 0 is highest (matches `NodeAttributes`
    /// convention; index 0 is drained first).
    shared: Vec<SpinLock<VecDeque<TaskHandle>>>,
    private: SpinLock<VecDeque<TaskHandle>>,
}

pub struct RunQueues {
    workers: Vec<WorkerQueues>,
    num_priorities: usize,
}

impl RunQueues {
    pub fn new(num_workers: usize, num_priorities: usize) -> Self {
        let workers = (0..num_workers)
            .map(|_| WorkerQueues {
                shared: (0..num_priorities).map(|_| SpinLock::new(VecDeque::new())).collect(),
                private: SpinLock::new(VecDeque::new()),
            })
            .collect();
        RunQueues {
            workers,
            num_priorities,
        }
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Push onto `worker`'s shared queue at `priority`, visible to stealers.
    pub fn push_shared(&self, worker: usize, priority: u8, task: TaskHandle) {
        let idx = (priority as usize).min(self.num_priorities - 1);
        self.workers[worker].shared[idx].lock().push_back(task);
    }

    /// Push onto `worker`'s private queue; only that worker will ever pop
    /// it.
    pub fn push_private(&self, worker: usize, task: TaskHandle) {
        self.workers[worker].private.lock().push_back(task);
    }

    /// Pop the next task `worker` should run from its own queues: private
    /// first (always, regardless of pinning — it holds tasks explicitly
    /// affine to this one worker), then shared queues from priority 0
    /// (highest) upward, or only `pinned_priority`'s shared queue if the
    /// worker is pinned (`NodeAttributes::worker_priority`).
    pub fn pop_own(&self, worker: usize, pinned_priority: Option<u8>) -> Option<TaskHandle> {
        if let Some(t) = self.workers[worker].private.lock().pop_front() {
            return Some(t);
        }
        match pinned_priority {
            Some(p) => self.pop_shared_at(worker, p),
            None => self.pop_shared_only(worker),
        }
    }

    fn pop_shared_only(&self, worker: usize) -> Option<TaskHandle> {
        for priority in 0..self.num_priorities {
            if let Some(t) = self.workers[worker].shared[priority].lock().pop_front() {
                return Some(t);
            }
        }
        None
    }

    fn pop_shared_at(&self, worker: usize, priority: u8) -> Option<TaskHandle> {
        let idx = (priority as usize).min(self.num_priorities - 1);
        self.workers[worker].shared[idx].lock().pop_front()
    }

    /// Scan other workers' shared queues (never a private one) looking for
    /// work, starting just after `worker`'s own index. A pinned stealer only
    /// looks for its own pinned priority in each victim.
    pub fn steal(&self, worker: usize, pinned_priority: Option<u8>) -> Option<TaskHandle> {
        let n = self.workers.len();
        if n <= 1 {
            return None;
        }
        for offset in 1..n {
            let victim = (worker + offset) % n;
            let found = match pinned_priority {
                Some(p) => self.pop_shared_at(victim, p),
                None => self.pop_shared_only(victim),
            };
            if found.is_some() {
                return found;
            }
        }
        None
    }

    /// Total tasks sitting in any queue, across all workers; used only for
    /// diagnostics/tests, not on the hot dispatch path.
    pub fn total_len(&self) -> usize {
        self.workers
            .iter()
            .map(|w| {
                w.private.lock().len() + w.shared.iter().map(|q| q.lock().len()).sum::<usize>()
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtapi_core::Handle;

    fn t(id: u32) -> TaskHandle {
        Handle::new(id, 0)
    }

    #[test]
    fn own_queue_prefers_private_then_highest_priority() {
        let rq = RunQueues::new(2, 4);
        rq.push_shared(0, 3, t(1));
        rq.push_shared(0, 0, t(2));
        rq.push_private(0, t(3));

        assert_eq!(rq.pop_own(0, None), Some(t(3)));
        assert_eq!(rq.pop_own(0, None), Some(t(2)), "priority 0 must drain before priority 3");
        assert_eq!(rq.pop_own(0, None), Some(t(1)));
        assert_eq!(rq.pop_own(0, None), None);
    }

    #[test]
    fn stealing_skips_private_queues() {
        let rq = RunQueues::new(2, 2);
        rq.push_private(1, t(1));
        rq.push_shared(1, 0, t(2));

        assert_eq!(rq.steal(0, None), Some(t(2)));
        assert_eq!(rq.steal(0, None), None, "private queue must never be stolen from");
    }

    #[test]
    fn steal_rotates_past_own_index() {
        let rq = RunQueues::new(3, 1);
        rq.push_shared(2, 0, t(9));
        assert_eq!(rq.steal(1, None), Some(t(9)));
    }

    #[test]
    fn single_worker_has_nothing_to_steal() {
        let rq = RunQueues::new(1, 2);
        assert_eq!(rq.steal(0, None), None);
    }

    #[test]
    fn pinned_priority_restricts_own_queue_drain() {
        let rq = RunQueues::new(1, 4);
        rq.push_shared(0, 0, t(1));
        rq.push_shared(0, 2, t(2));

        assert_eq!(rq.pop_own(0, Some(2)), Some(t(2)), "pinned worker must skip other priorities");
        assert_eq!(rq.pop_own(0, Some(2)), None, "priority 0's task is not pinned-eligible");
    }

    #[test]
    fn pinned_worker_still_drains_its_private_queue() {
        let rq = RunQueues::new(1, 4);
        rq.push_private(0, t(5));
        assert_eq!(rq.pop_own(0, Some(1)), Some(t(5)));
    }

    #[test]
    fn pinned_stealer_only_takes_matching_priority() {
        let rq = RunQueues::new(2, 4);
        rq.push_shared(1, 0, t(1));
        rq.push_shared(1, 2, t(2));

        assert_eq!(rq.steal(0, Some(2)), Some(t(2)));
        assert_eq!(rq.steal(0, Some(2)), None);
    }
}

//! Node attributes: a builder with compile-time defaults and environment
//! variable overrides.
//!
//! Mirrors the reference runtime's `mtapi_node_attributes_t` defaults
//! (workers = available cores, 4 priorities, max-tasks = 1024, ...) and the
//! existing workspace convention of a consuming-setter builder plus a
//! `from_env()` constructor that layers `MTAPI_*` variables on top.

use mtapi_core::env::env_get;

/// Default attributes for `Node::initialize`.
#[derive(Debug, Clone)]
pub struct NodeAttributes {
    pub num_workers: usize,
    pub num_priorities: usize,
    pub max_tasks: usize,
    pub max_actions: usize,
    pub max_groups: usize,
    pub max_queues: usize,
    pub max_jobs: usize,
    pub queue_limit: usize,
    pub reuse_main_thread: bool,
    pub stack_size: usize,
    /// Per-worker priority restriction: `Some(p)` pins a worker to serving
    /// only priority `p`; `None` (the default for every worker) means the
    /// worker services every priority in strict order.
    pub worker_priorities: Vec<Option<u8>>,
}

mod defaults {
    pub const NUM_PRIORITIES: usize = 4;
    pub const MAX_TASKS: usize = 1024;
    pub const MAX_ACTIONS: usize = 128;
    pub const MAX_GROUPS: usize = 128;
    pub const MAX_QUEUES: usize = 16;
    pub const MAX_JOBS: usize = 64;
    pub const QUEUE_LIMIT: usize = 16;
    pub const REUSE_MAIN_THREAD: bool = true;
    pub const STACK_SIZE: usize = 2 * 1024 * 1024;
}

impl Default for NodeAttributes {
    fn default() -> Self {
        let num_workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        NodeAttributes {
            num_workers,
            num_priorities: defaults::NUM_PRIORITIES,
            max_tasks: defaults::MAX_TASKS,
            max_actions: defaults::MAX_ACTIONS,
            max_groups: defaults::MAX_GROUPS,
            max_queues: defaults::MAX_QUEUES,
            max_jobs: defaults::MAX_JOBS,
            queue_limit: defaults::QUEUE_LIMIT,
            reuse_main_thread: defaults::REUSE_MAIN_THREAD,
            stack_size: defaults::STACK_SIZE,
            worker_priorities: vec![None; num_workers],
        }
    }
}

impl NodeAttributes {
    /// Defaults with environment variable overrides applied.
    ///
    /// - `MTAPI_NUM_WORKERS`
    /// - `MTAPI_NUM_PRIORITIES`
    /// - `MTAPI_MAX_TASKS`
    /// - `MTAPI_MAX_ACTIONS`
    /// - `MTAPI_MAX_GROUPS`
    /// - `MTAPI_MAX_QUEUES`
    /// - `MTAPI_MAX_JOBS`
    /// - `MTAPI_QUEUE_LIMIT`
    /// - `MTAPI_REUSE_MAIN_THREAD` (0/1)
    /// - `MTAPI_STACK_SIZE`
    pub fn from_env() -> Self {
        let base = Self::default();
        let num_workers = env_get("MTAPI_NUM_WORKERS", base.num_workers);
        NodeAttributes {
            num_workers,
            num_priorities: env_get("MTAPI_NUM_PRIORITIES", base.num_priorities),
            max_tasks: env_get("MTAPI_MAX_TASKS", base.max_tasks),
            max_actions: env_get("MTAPI_MAX_ACTIONS", base.max_actions),
            max_groups: env_get("MTAPI_MAX_GROUPS", base.max_groups),
            max_queues: env_get("MTAPI_MAX_QUEUES", base.max_queues),
            max_jobs: env_get("MTAPI_MAX_JOBS", base.max_jobs),
            queue_limit: env_get("MTAPI_QUEUE_LIMIT", base.queue_limit),
            reuse_main_thread: env_get(
                "MTAPI_REUSE_MAIN_THREAD",
                if base.reuse_main_thread { 1u8 } else { 0 },
            ) != 0,
            stack_size: env_get("MTAPI_STACK_SIZE", base.stack_size),
            worker_priorities: vec![None; num_workers],
        }
    }

    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self.worker_priorities.resize(n, None);
        self
    }

    pub fn num_priorities(mut self, n: usize) -> Self {
        self.num_priorities = n;
        self
    }

    pub fn max_tasks(mut self, n: usize) -> Self {
        self.max_tasks = n;
        self
    }

    pub fn max_actions(mut self, n: usize) -> Self {
        self.max_actions = n;
        self
    }

    pub fn max_groups(mut self, n: usize) -> Self {
        self.max_groups = n;
        self
    }

    pub fn max_queues(mut self, n: usize) -> Self {
        self.max_queues = n;
        self
    }

    pub fn max_jobs(mut self, n: usize) -> Self {
        self.max_jobs = n;
        self
    }

    pub fn queue_limit(mut self, n: usize) -> Self {
        self.queue_limit = n;
        self
    }

    pub fn reuse_main_thread(mut self, reuse: bool) -> Self {
        self.reuse_main_thread = reuse;
        self
    }

    pub fn stack_size(mut self, n: usize) -> Self {
        self.stack_size = n;
        self
    }

    /// Pin worker `index` to serving only priority `priority`.
    pub fn worker_priority(mut self, index: usize, priority: u8) -> Self {
        if index < self.worker_priorities.len() {
            self.worker_priorities[index] = Some(priority);
        }
        self
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.num_workers == 0 {
            return Err("num_workers must be > 0");
        }
        if self.num_workers > mtapi_core::constants::MAX_WORKERS {
            return Err("num_workers exceeds MAX_WORKERS");
        }
        if self.num_priorities == 0 {
            return Err("num_priorities must be > 0");
        }
        if self.num_priorities > 64 {
            return Err("num_priorities must be <= 64");
        }
        if self.max_tasks == 0 || self.max_actions == 0 || self.max_groups == 0
            || self.max_queues == 0 || self.max_jobs == 0
        {
            return Err("pool capacities must be > 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_values() {
        let a = NodeAttributes::default();
        assert_eq!(a.num_priorities, 4);
        assert_eq!(a.max_tasks, 1024);
        assert_eq!(a.max_actions, 128);
        assert_eq!(a.max_groups, 128);
        assert_eq!(a.max_queues, 16);
        assert_eq!(a.max_jobs, 64);
        assert_eq!(a.queue_limit, 16);
        assert!(a.reuse_main_thread);
        assert!(a.validate().is_ok());
    }

    #[test]
    fn builder_overrides_fields() {
        let a = NodeAttributes::default().num_workers(3).max_tasks(10);
        assert_eq!(a.num_workers, 3);
        assert_eq!(a.max_tasks, 10);
        assert_eq!(a.worker_priorities.len(), 3);
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let a = NodeAttributes::default().num_workers(0);
        assert!(a.validate().is_err());
    }
}

//! Worker thread management (§3's "Worker Context").
//!
//! Workers are plain OS threads, one per configured worker slot, each
//! running a synchronous fetch-execute-complete loop (`scheduler.rs`) until
//! shutdown. Unlike the cache-line-aligned, timer-scanned state array this
//! module replaces, there is no preemption timer here: a task runs to
//! completion cooperatively, so a worker's state is just what the scheduler
//! needs to park and wake it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

/// Per-worker state the scheduler parks/wakes against.
pub struct WorkerContext {
    pub index: usize,
    /// `Some(p)` restricts this worker to draining only priority `p`'s
    /// queues (`NodeAttributes::worker_priority`); `None` services every
    /// priority in its normal highest-first order.
    pub pinned_priority: Option<u8>,
    is_sleeping: AtomicBool,
    sleep_lock: Mutex<()>,
    sleep_cv: Condvar,
}

impl WorkerContext {
    fn new(index: usize, pinned_priority: Option<u8>) -> Self {
        WorkerContext {
            index,
            pinned_priority,
            is_sleeping: AtomicBool::new(false),
            sleep_lock: Mutex::new(()),
            sleep_cv: Condvar::new(),
        }
    }

    /// Park this worker until woken or `deadline_check` starts returning
    /// `true` (used for spurious-wakeup immunity against shutdown).
    pub fn park(&self, should_wake: impl Fn() -> bool) {
        let guard = self.sleep_lock.lock().unwrap();
        if should_wake() {
            return;
        }
        self.is_sleeping.store(true, Ordering::Release);
        let (_guard, _timeout) = self
            .sleep_cv
            .wait_timeout_while(guard, std::time::Duration::from_millis(50), |_| {
                !should_wake()
            })
            .unwrap();
        self.is_sleeping.store(false, Ordering::Release);
    }

    pub fn wake(&self) {
        if self.is_sleeping.load(Ordering::Acquire) {
            let _guard = self.sleep_lock.lock().unwrap();
            self.sleep_cv.notify_one();
        }
    }

    pub fn is_sleeping(&self) -> bool {
        self.is_sleeping.load(Ordering::Acquire)
    }
}

pub struct WorkerPool {
    contexts: Vec<Arc<WorkerContext>>,
    handles: Vec<JoinHandle<()>>,
    shutdown: AtomicBool,
}

impl WorkerPool {
    pub fn new(num_workers: usize, worker_priorities: &[Option<u8>]) -> Self {
        let contexts = (0..num_workers)
            .map(|i| {
                Arc::new(WorkerContext::new(
                    i,
                    worker_priorities.get(i).copied().flatten(),
                ))
            })
            .collect();
        WorkerPool {
            contexts,
            handles: Vec::with_capacity(num_workers),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn num_workers(&self) -> usize {
        self.contexts.len()
    }

    pub fn context(&self, index: usize) -> Arc<WorkerContext> {
        Arc::clone(&self.contexts[index])
    }

    /// Spawn one OS thread per worker context, each running `worker_fn`.
    /// `reuse_main_thread`, when set, skips spawning worker 0's thread; the
    /// caller is expected to run that worker's loop on the calling thread
    /// instead (mirrors `NodeAttributes::reuse_main_thread`).
    pub fn start<F>(&mut self, reuse_main_thread: bool, worker_fn: F)
    where
        F: Fn(Arc<WorkerContext>) + Send + Sync + Clone + 'static,
    {
        for ctx in &self.contexts {
            if reuse_main_thread && ctx.index == 0 {
                continue;
            }
            let ctx = Arc::clone(ctx);
            let worker_fn = worker_fn.clone();
            let handle = thread::Builder::new()
                .name(format!("mtapi-worker-{}", ctx.index))
                .spawn(move || worker_fn(ctx))
                .expect("failed to spawn worker thread");
            self.handles.push(handle);
        }
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        for ctx in &self.contexts {
            ctx.wake();
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub fn join(self) {
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

thread_local! {
    static CURRENT_WORKER_ID: std::cell::Cell<usize> = const { std::cell::Cell::new(usize::MAX) };
}

pub fn set_current_worker_id(id: usize) {
    CURRENT_WORKER_ID.with(|cell| cell.set(id));
    mtapi_core::log::set_worker_id(id as u32);
}

pub fn current_worker_id() -> usize {
    CURRENT_WORKER_ID.with(|cell| cell.get())
}

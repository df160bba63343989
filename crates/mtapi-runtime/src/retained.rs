//! Intrusive retained-task list.
//!
//! Ordered queues that retain completed tasks (`QueueAttributes::retain`)
//! need to walk their backlog without allocating — grounded in
//! `embb_mtapi_task_queue_t`'s `process(visitor)` pattern, one of the few
//! places the reference runtime keeps genuine intrusive pointers rather
//! than a pool-backed `Vec`. Tasks already carry a `next: Option<TaskHandle>`
//! field for exactly this purpose (see `task.rs`); this type only manages
//! the head/tail and the traversal, never the task storage itself.

use std::sync::Mutex;

use crate::task::TaskHandle;

struct Inner {
    head: Option<TaskHandle>,
    tail: Option<TaskHandle>,
    len: usize,
}

/// A FIFO of task handles linked through each task's own `next` field.
/// Requires a lookup function to resolve a handle to its task record, since
/// the list itself stores only handles.
pub struct RetainedList {
    inner: Mutex<Inner>,
}

impl RetainedList {
    pub fn new() -> Self {
        RetainedList {
            inner: Mutex::new(Inner {
                head: None,
                tail: None,
                len: 0,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `handle` to the tail. `set_next` must store `next` into the
    /// task identified by its first argument (the list does not own task
    /// storage, only the head/tail bookkeeping).
    pub fn push_back(&self, handle: TaskHandle, set_next: impl Fn(TaskHandle, Option<TaskHandle>)) {
        let mut inner = self.inner.lock().unwrap();
        set_next(handle, None);
        if let Some(tail) = inner.tail {
            set_next(tail, Some(handle));
        }
        inner.tail = Some(handle);
        if inner.head.is_none() {
            inner.head = Some(handle);
        }
        inner.len += 1;
    }

    /// Pop the head, invoking `get_next` to read the popped task's `next`
    /// pointer and advance the list.
    pub fn pop_front(&self, get_next: impl FnOnce(TaskHandle) -> Option<TaskHandle>) -> Option<TaskHandle> {
        let mut inner = self.inner.lock().unwrap();
        let head = inner.head?;
        let next = get_next(head);
        inner.head = next;
        if inner.head.is_none() {
            inner.tail = None;
        }
        inner.len -= 1;
        Some(head)
    }

    /// Visit every retained handle in order without removing them.
    pub fn process(&self, get_next: impl Fn(TaskHandle) -> Option<TaskHandle>, mut visitor: impl FnMut(TaskHandle)) {
        let inner = self.inner.lock().unwrap();
        let mut cur = inner.head;
        while let Some(h) = cur {
            visitor(h);
            cur = get_next(h);
        }
    }
}

impl Default for RetainedList {
    fn default() -> Self {
        Self::new()
    }
}

//! Task records.
//!
//! A task is a single invocation of an action with specific arguments; it
//! carries its own state machine, instance counters, and an intrusive
//! `next` link used while it sits in a queue's retention buffer (see
//! `retained.rs`). Argument/result buffers are raw pointer+length pairs
//! rather than borrowed slices — a `Task` is stored in a pool behind a
//! handle and can outlive the stack frame that spawned it (until the
//! caller's `Wait` returns, or forever for a detached task with
//! caller-owned storage), so it cannot hold a Rust lifetime.

use mtapi_core::{Affinity, AtomicTaskState, CancelFlag, TaskState};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::action::ActionHandle;
use crate::error::TaskOutcome;
use crate::group::GroupHandle;
use crate::job::JobHandle;
use crate::queue::QueueHandle;
use mtapi_core::MtapiError;

pub type TaskHandle = mtapi_core::Handle<Task>;

/// Raw argument/result buffer. `Send`/`Sync` are asserted by hand: the
/// runtime's state machine ensures only one worker ever touches a task's
/// buffers while it is `RUNNING`, and the terminal transition establishes
/// happens-before with any later `Wait` (§5).
struct RawBuf {
    ptr: *mut u8,
    len: usize,
}
unsafe impl Send for RawBuf {}
unsafe impl Sync for RawBuf {}

impl RawBuf {
    const NONE: RawBuf = RawBuf {
        ptr: std::ptr::null_mut(),
        len: 0,
    };

    fn from_ptr(ptr: *const u8, len: usize) -> Self {
        RawBuf {
            ptr: ptr as *mut u8,
            len,
        }
    }

    fn from_mut_ptr(ptr: *mut u8, len: usize) -> Self {
        RawBuf { ptr, len }
    }

    /// # Safety
    /// Caller must ensure the pointed-to memory is still live and that no
    /// other writer is touching it concurrently.
    unsafe fn as_slice(&self) -> &[u8] {
        if self.ptr.is_null() {
            &[]
        } else {
            std::slice::from_raw_parts(self.ptr, self.len)
        }
    }

    /// # Safety
    /// Same as `as_slice`, with exclusive access required.
    unsafe fn as_mut_slice(&self) -> &mut [u8] {
        if self.ptr.is_null() {
            &mut []
        } else {
            std::slice::from_raw_parts_mut(self.ptr, self.len)
        }
    }
}

pub type CompleteFn = Arc<dyn Fn(TaskHandle, TaskOutcome) + Send + Sync>;

/// One typed setter per attribute, per §9's redesign note.
#[derive(Clone)]
pub struct TaskAttributes {
    pub num_instances: u32,
    pub priority: u8,
    pub affinity: Option<Affinity>,
    pub detached: bool,
    pub complete_func: Option<CompleteFn>,
    pub user_data: u64,
    /// Granularity hint for multi-instance tasks (kept from the reference
    /// runtime's `mtapi_taskattr_init`; not otherwise interpreted by the
    /// scheduler).
    pub problem_size: usize,
}

impl Default for TaskAttributes {
    fn default() -> Self {
        TaskAttributes {
            num_instances: 1,
            priority: 0,
            affinity: None,
            detached: false,
            complete_func: None,
            user_data: 0,
            problem_size: 1,
        }
    }
}

impl TaskAttributes {
    pub fn num_instances(mut self, n: u32) -> Self {
        self.num_instances = n;
        self
    }
    pub fn priority(mut self, p: u8) -> Self {
        self.priority = p;
        self
    }
    pub fn affinity(mut self, a: Affinity) -> Self {
        self.affinity = Some(a);
        self
    }
    pub fn detached(mut self, d: bool) -> Self {
        self.detached = d;
        self
    }
    pub fn user_data(mut self, tag: u64) -> Self {
        self.user_data = tag;
        self
    }
    pub fn problem_size(mut self, size: usize) -> Self {
        self.problem_size = size;
        self
    }
    pub fn complete_func(
        mut self,
        f: impl Fn(TaskHandle, TaskOutcome) + Send + Sync + 'static,
    ) -> Self {
        self.complete_func = Some(Arc::new(f));
        self
    }
}

pub struct Task {
    pub handle: TaskHandle,
    pub job: JobHandle,
    pub action: Option<ActionHandle>,
    pub group: Option<GroupHandle>,
    pub queue: Option<QueueHandle>,
    pub attrs: TaskAttributes,

    args: RawBuf,
    result: RawBuf,

    pub state: AtomicTaskState,
    pub current_instance: AtomicU32,
    pub instances_todo: AtomicUsize,
    pub cancel: CancelFlag,
    /// Cached outcome, set exactly once on the terminal transition so a
    /// second `Wait` is idempotent (§8).
    outcome: std::sync::Mutex<Option<TaskOutcome>>,
    /// Status an action body reported via `TaskContext::set_status` before
    /// returning; read back by the scheduler when finalizing the task.
    pub(crate) reported_error: std::sync::Mutex<Option<MtapiError>>,

    /// Intrusive link used only while this task sits in a retention buffer
    /// (§9: "keep intrusive next pointers ... a task belongs to exactly one
    /// queue at a time").
    pub next: Option<TaskHandle>,
}

impl Task {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        handle: TaskHandle,
        job: JobHandle,
        args: *const u8,
        args_len: usize,
        result: *mut u8,
        result_len: usize,
        attrs: TaskAttributes,
        group: Option<GroupHandle>,
        queue: Option<QueueHandle>,
    ) -> Self {
        let instances = attrs.num_instances.max(1) as usize;
        Task {
            handle,
            job,
            action: None,
            group,
            queue,
            args: if args.is_null() {
                RawBuf::NONE
            } else {
                RawBuf::from_ptr(args, args_len)
            },
            result: if result.is_null() {
                RawBuf::NONE
            } else {
                RawBuf::from_mut_ptr(result, result_len)
            },
            attrs,
            state: AtomicTaskState::new(TaskState::Created),
            current_instance: AtomicU32::new(0),
            instances_todo: AtomicUsize::new(instances),
            cancel: CancelFlag::new(),
            outcome: std::sync::Mutex::new(None),
            reported_error: std::sync::Mutex::new(None),
            next: None,
        }
    }

    pub fn report_error(&self, err: MtapiError) {
        *self.reported_error.lock().unwrap() = Some(err);
    }

    pub fn take_reported_error(&self) -> Option<MtapiError> {
        *self.reported_error.lock().unwrap()
    }

    /// # Safety
    /// Valid only while the caller (or the task itself) guarantees the
    /// backing storage is alive.
    pub unsafe fn args(&self) -> &[u8] {
        self.args.as_slice()
    }

    /// # Safety
    /// Same as `args`, with exclusive-access guaranteed by the state
    /// machine (only the worker currently running this task calls this).
    pub unsafe fn result_mut(&self) -> &mut [u8] {
        self.result.as_mut_slice()
    }

    pub fn set_outcome(&self, outcome: TaskOutcome) {
        let mut guard = self.outcome.lock().unwrap();
        if guard.is_none() {
            *guard = Some(outcome);
        }
    }

    pub fn outcome(&self) -> Option<TaskOutcome> {
        *self.outcome.lock().unwrap()
    }

    /// Decrement the completion counter; returns `true` if this call made
    /// it reach zero (the "last decrementer" per §3's invariant).
    pub fn instance_completed(&self) -> bool {
        self.instances_todo.fetch_sub(1, Ordering::AcqRel) == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(id: u32) -> TaskHandle {
        mtapi_core::Handle::new(id, 0)
    }

    #[test]
    fn outcome_is_set_once() {
        let t = Task::new(
            handle(1),
            JobHandle { job_id: 1, domain_id: 0 },
            std::ptr::null(),
            0,
            std::ptr::null_mut(),
            0,
            TaskAttributes::default(),
            None,
            None,
        );
        t.set_outcome(TaskOutcome::Success);
        t.set_outcome(TaskOutcome::Cancelled);
        assert_eq!(t.outcome(), Some(TaskOutcome::Success));
    }

    #[test]
    fn single_instance_completes_immediately() {
        let t = Task::new(
            handle(2),
            JobHandle { job_id: 1, domain_id: 0 },
            std::ptr::null(),
            0,
            std::ptr::null_mut(),
            0,
            TaskAttributes::default(),
            None,
            None,
        );
        assert!(t.instance_completed());
    }

    #[test]
    fn multi_instance_last_decrementer_wins() {
        let t = Task::new(
            handle(3),
            JobHandle { job_id: 1, domain_id: 0 },
            std::ptr::null(),
            0,
            std::ptr::null_mut(),
            0,
            TaskAttributes::default().num_instances(3),
            None,
            None,
        );
        assert!(!t.instance_completed());
        assert!(!t.instance_completed());
        assert!(t.instance_completed());
    }

    #[test]
    fn args_roundtrip_through_raw_buffer() {
        let data = b"hello".to_vec();
        let t = Task::new(
            handle(4),
            JobHandle { job_id: 1, domain_id: 0 },
            data.as_ptr(),
            data.len(),
            std::ptr::null_mut(),
            0,
            TaskAttributes::default(),
            None,
            None,
        );
        unsafe {
            assert_eq!(t.args(), b"hello");
        }
    }
}

//! Task groups.
//!
//! A group collects a set of in-flight tasks so callers can wait on all of
//! them (`WaitAll`) or drain completions one at a time (`WaitAny`). Group
//! attributes are deliberately an empty builder: the reference runtime's
//! `mtapi_groupattr_set` recognizes zero attributes (always returns
//! `MTAPI_ERR_ATTR_NUM`), so there is nothing to expose here beyond API
//! symmetry with actions/queues/tasks.

use mtapi_core::MtapiError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::task::TaskHandle;

pub type GroupHandle = mtapi_core::Handle<Group>;

/// Intentionally empty: see module docs.
#[derive(Debug, Default, Clone, Copy)]
pub struct GroupAttributes;

impl GroupAttributes {
    pub fn new() -> Self {
        GroupAttributes
    }
}

struct Completion {
    task: TaskHandle,
    user_data: u64,
    outcome: Result<(), MtapiError>,
}

#[derive(Default)]
struct GroupState {
    completed: VecDeque<Completion>,
    /// First non-success status observed across the group's tasks, latched
    /// once (§9's "first-error-wins" decision for deterministic `WaitAll`).
    first_error: Option<MtapiError>,
}

pub struct Group {
    pub handle: GroupHandle,
    pending: AtomicUsize,
    state: Mutex<GroupState>,
}

impl Group {
    pub fn new(handle: GroupHandle) -> Self {
        Group {
            handle,
            pending: AtomicUsize::new(0),
            state: Mutex::new(GroupState::default()),
        }
    }

    pub fn task_added(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Record a task's completion. The caller (`Node`) is responsible for
    /// waking anyone re-entrantly waiting on this group.
    pub fn task_completed(&self, task: TaskHandle, user_data: u64, outcome: Result<(), MtapiError>) {
        let mut state = self.state.lock().unwrap();
        if state.first_error.is_none() {
            if let Err(e) = outcome {
                state.first_error = Some(e);
            }
        }
        state.completed.push_back(Completion {
            task,
            user_data,
            outcome,
        });
        drop(state);
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }

    /// Non-blocking pop of one completed task, if any is queued.
    pub fn pop_completed(&self) -> Option<(TaskHandle, u64, Result<(), MtapiError>)> {
        let mut state = self.state.lock().unwrap();
        state.completed.pop_front().map(|c| (c.task, c.user_data, c.outcome))
    }

    /// Clear the completion queue and return the first non-success status
    /// seen since the group was created, if any. Meant to be called once
    /// `pending_count()` has reached zero.
    pub fn drain_result(&self) -> Result<(), MtapiError> {
        let mut state = self.state.lock().unwrap();
        state.completed.clear();
        state.first_error.take().map_or(Ok(()), Err)
    }
}

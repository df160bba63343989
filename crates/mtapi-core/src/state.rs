//! Task state machine.
//!
//! `CREATED → SCHEDULED → RUNNING → {COMPLETED, CANCELLED, ERROR}`, with
//! `RETAINED` as the adjunct state for queue-backlogged tasks and `DELETED`
//! once a terminal task's slot has actually been freed.

use std::sync::atomic::{AtomicU8, Ordering};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created = 0,
    Scheduled = 1,
    Running = 2,
    Retained = 3,
    Completed = 4,
    Cancelled = 5,
    Error = 6,
    Deleted = 7,
}

impl TaskState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => TaskState::Created,
            1 => TaskState::Scheduled,
            2 => TaskState::Running,
            3 => TaskState::Retained,
            4 => TaskState::Completed,
            5 => TaskState::Cancelled,
            6 => TaskState::Error,
            _ => TaskState::Deleted,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Cancelled | TaskState::Error | TaskState::Deleted
        )
    }
}

/// An atomic `TaskState` cell with a CAS helper for the one transition the
/// scheduler actually contends on: `SCHEDULED -> RUNNING`, where exactly one
/// worker must win.
pub struct AtomicTaskState(AtomicU8);

impl AtomicTaskState {
    pub fn new(state: TaskState) -> Self {
        AtomicTaskState(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> TaskState {
        TaskState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: TaskState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Attempt to move from `from` to `to`; returns whether this call won.
    pub fn try_transition(&self, from: TaskState, to: TaskState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

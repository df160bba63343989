//! Cooperative cancellation flag.
//!
//! `Cancel(task)` and queue `Disable` only ever flip a bit; they never
//! interrupt a running action. The action body is expected to poll
//! `TaskContext::should_cancel()` (see the facade crate) at points where
//! bailing out early is safe.

use std::sync::atomic::{AtomicBool, Ordering};

/// A single cancellation bit, embedded directly in a task's storage slot
/// rather than heap-allocated — there is exactly one flag per task and it
/// never outlives the task, so an `Arc<AtomicBool>` would be pure overhead.
#[derive(Debug, Default)]
pub struct CancelFlag(AtomicBool);

impl CancelFlag {
    pub const fn new() -> Self {
        CancelFlag(AtomicBool::new(false))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled() {
        let f = CancelFlag::new();
        assert!(!f.is_cancelled());
    }

    #[test]
    fn cancel_is_observed() {
        let f = CancelFlag::new();
        f.cancel();
        assert!(f.is_cancelled());
    }

    #[test]
    fn reset_clears() {
        let f = CancelFlag::new();
        f.cancel();
        f.reset();
        assert!(!f.is_cancelled());
    }
}

//! Plugin hook contracts.
//!
//! An action can be backed either by an ordinary in-process function or by
//! an externally-provided plugin (network transport, accelerator dispatch,
//! ...). The plugin is handed a [`CoreCallback`] — a narrow, object-safe
//! slice of the node's API — so it can eventually call back into the core
//! to move its task to `RUNNING` and then to a terminal state, without this
//! crate depending on the concrete `Node` type (which in turn depends on
//! actions). The actual transports are out of scope here; only the
//! contract is.

use crate::error::TaskOutcome;
use crate::TaskHandle;

/// The minimal surface a plugin needs to drive a task's lifecycle from the
/// outside. `Node` implements this.
pub trait CoreCallback: Send + Sync {
    /// Attempt the `SCHEDULED -> RUNNING` transition for `task`. Returns
    /// `false` if the task was already cancelled or otherwise not eligible.
    fn mark_running(&self, task: TaskHandle) -> bool;

    /// Transition `task` to a terminal state and run the usual completion
    /// bookkeeping (group/queue notification, action/queue counters,
    /// complete-callback, waiter wakeup).
    fn complete(&self, task: TaskHandle, outcome: TaskOutcome);
}

/// A plugin-backed action. `start` is invoked by the scheduler instead of
/// an ordinary action function; `cancel` is invoked by `CancelTask`;
/// `finalize` runs once when the action is deleted.
pub trait PluginAction: Send + Sync {
    fn start(&self, task: TaskHandle, core: &dyn CoreCallback);
    fn cancel(&self, task: TaskHandle);
    fn finalize(&self) {}
}

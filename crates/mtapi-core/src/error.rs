//! Status codes for the runtime.
//!
//! One hand-rolled enum carries every status the core can return, mirroring
//! the flat status-code surface of the system this runtime's error model is
//! drawn from. No `thiserror`/`anyhow` — `Display` and `std::error::Error`
//! are implemented by hand so this crate stays dependency-free at its most
//! fundamental layer.

use std::fmt;

/// Every status the core can return, success and failure alike.
///
/// `Wait`/`WaitAny`/`WaitAll` are the only operations that surface a task's
/// asynchronous outcome; every other operation returns synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MtapiError {
    /// Non-error control value: the operation the caller was waiting on
    /// did not finish within the given timeout.
    Timeout,
    /// `WaitAny` returned this when a group has no outstanding or completed
    /// tasks left.
    GroupCompleted,

    /// The node has not been initialized.
    NodeNotInit,
    /// The node has already been initialized.
    NodeInitialized,

    /// A call received a malformed argument (null pointer, zero size, etc).
    Parameter,
    /// An attribute setter received an attribute number it doesn't recognize.
    AttrNum,
    /// An attribute setter received a value of the wrong size.
    AttrSize,

    /// A job-id handle was stale or out of range.
    JobInvalid,
    /// An action handle was stale or out of range.
    ActionInvalid,
    /// A task handle was stale or out of range.
    TaskInvalid,
    /// A group handle was stale or out of range.
    GroupInvalid,
    /// A queue handle was stale or out of range.
    QueueInvalid,

    /// The task pool is exhausted.
    TaskLimit,
    /// The action pool is exhausted.
    ActionLimit,
    /// The group pool is exhausted.
    GroupLimit,
    /// The queue pool is exhausted.
    QueueLimit,
    /// The job table is exhausted.
    JobLimit,

    /// No worker's core mask intersects the requested affinity.
    Affinity,

    /// The action ran to completion but reported a non-zero status.
    ActionFailed,
    /// The task was cancelled before or during execution.
    ActionCancelled,

    /// An affinity API received a worker index outside `[0, num_workers)`.
    CoreNum,

    /// A plugin hook (`start_fn`/`cancel_fn`/`finalize_fn`) was not
    /// registered for a plugin action.
    FuncNotImplemented,
}

impl MtapiError {
    /// Whether this value represents a control outcome rather than a true
    /// error. Used by the logging layer to decide whether a returned status
    /// is worth a `warn!` line or only `trace!`.
    pub fn is_control(&self) -> bool {
        matches!(self, MtapiError::Timeout | MtapiError::GroupCompleted)
    }
}

impl fmt::Display for MtapiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            MtapiError::Timeout => "operation timed out",
            MtapiError::GroupCompleted => "group has no outstanding or completed tasks",
            MtapiError::NodeNotInit => "node is not initialized",
            MtapiError::NodeInitialized => "node is already initialized",
            MtapiError::Parameter => "invalid parameter",
            MtapiError::AttrNum => "unknown attribute number",
            MtapiError::AttrSize => "attribute value has the wrong size",
            MtapiError::JobInvalid => "invalid or stale job handle",
            MtapiError::ActionInvalid => "invalid or stale action handle",
            MtapiError::TaskInvalid => "invalid or stale task handle",
            MtapiError::GroupInvalid => "invalid or stale group handle",
            MtapiError::QueueInvalid => "invalid or stale queue handle",
            MtapiError::TaskLimit => "task pool exhausted",
            MtapiError::ActionLimit => "action pool exhausted",
            MtapiError::GroupLimit => "group pool exhausted",
            MtapiError::QueueLimit => "queue pool exhausted",
            MtapiError::JobLimit => "job table exhausted",
            MtapiError::Affinity => "no worker satisfies the requested affinity",
            MtapiError::ActionFailed => "action reported a non-zero status",
            MtapiError::ActionCancelled => "task was cancelled",
            MtapiError::CoreNum => "worker index out of range",
            MtapiError::FuncNotImplemented => "plugin hook not registered",
        };
        write!(f, "{}", msg)
    }
}

impl std::error::Error for MtapiError {}

pub type MtapiResult<T> = Result<T, MtapiError>;

/// Log and abort the process. Reserved for internal invariant violations —
/// a corrupt run queue or a double-freed handle indicates memory unsafety
/// and, per the error handling design, cannot be recovered from.
#[cold]
#[inline(never)]
pub fn fatal_invariant(msg: &str) -> ! {
    crate::log_error!("internal invariant violated: {msg}");
    std::process::abort();
}

//! Task completion outcome.
//!
//! Distinct from [`mtapi_core::MtapiError`], which is the status code
//! returned *synchronously* by an API call. `TaskOutcome` is the result an
//! action body produces asynchronously and that `Wait*` surfaces.

pub use mtapi_core::MtapiError;

/// The final outcome of a task, cached on the task record so repeated
/// `Wait` calls on an already-terminal task are idempotent (§8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Cancelled,
    Failed(MtapiError),
}

impl TaskOutcome {
    /// Convert to the `MtapiError` a `Wait*` call returns, or `Ok(())` on
    /// success.
    pub fn into_result(self) -> Result<(), MtapiError> {
        match self {
            TaskOutcome::Success => Ok(()),
            TaskOutcome::Cancelled => Err(MtapiError::ActionCancelled),
            TaskOutcome::Failed(e) => Err(e),
        }
    }
}

//! # mtapi-core
//!
//! Platform-agnostic core types for the multicore task runtime: generational
//! handles and the pool that hands them out, worker affinity masks, the task
//! state machine, cooperative cancellation, status codes, environment-driven
//! configuration helpers, and the logging macros everything else in the
//! workspace logs through.
//!
//! All OS-thread-specific machinery (worker pool, run queues, scheduler) lives
//! in `mtapi-runtime`, which depends on this crate.
//!
//! ## Modules
//!
//! - `handle` - generational `Handle<T>`
//! - `pool` - id pool (ring buffer) + generic slab `Pool<T>`
//! - `affinity` - worker affinity bitmask
//! - `state` - task state machine
//! - `cancel` - cooperative cancellation flag
//! - `error` - status codes (`MtapiError`)
//! - `spinlock` - internal spinlock primitive
//! - `log` - kernel-style debug logging macros
//! - `env` - environment variable utilities

pub mod affinity;
pub mod cancel;
pub mod env;
pub mod error;
pub mod handle;
pub mod log;
pub mod pool;
pub mod spinlock;
pub mod state;

pub use affinity::Affinity;
pub use cancel::CancelFlag;
pub use env::{env_get, env_get_bool, env_get_opt, env_get_str, env_is_set};
pub use error::{fatal_invariant, MtapiError, MtapiResult};
pub use handle::Handle;
pub use pool::{IdPool, Pool};
pub use spinlock::SpinLock;
pub use state::{AtomicTaskState, TaskState};

/// Compile-time and process-wide constants.
pub mod constants {
    /// Cache line size used for alignment of hot atomics.
    pub const CACHE_LINE_SIZE: usize = 64;
    /// Maximum number of worker threads a node can be configured with.
    pub const MAX_WORKERS: usize = 64;
}

//! Actions: the executable body registered against a job.
//!
//! An action is either an ordinary Rust closure or a [`PluginAction`]
//! (§4.2's redesign note folds the reference runtime's separate
//! "mtapi_action" / plugin-action split into one enum so the scheduler has
//! a single dispatch point). Several actions can implement the same job;
//! `Node::start_task` picks among the enabled, affinity-matching ones by
//! least in-flight load, falling back to insertion order to break ties
//! (mirrors `embb_mtapi_job_t`'s round-robin-by-load action selection).

use mtapi_core::Affinity;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::context::TaskContext;
use crate::error::MtapiError;
use crate::plugin::PluginAction;

pub type ActionHandle = mtapi_core::Handle<Action>;

/// An ordinary in-process action body: given a context and the raw
/// argument/result buffers, run to completion and report a status.
pub type ActionFn = Arc<dyn Fn(&TaskContext, &[u8], &mut [u8]) -> Result<(), MtapiError> + Send + Sync>;

pub enum ActionBody {
    Local(ActionFn),
    Plugin(Arc<dyn PluginAction>),
}

/// Settable action attributes, restricted to exactly the three fields
/// `mtapi_actionattr_set` recognizes in the reference runtime.
#[derive(Debug, Clone)]
pub struct ActionAttributes {
    pub domain_shared: bool,
    pub global: bool,
    pub affinity: Affinity,
}

impl ActionAttributes {
    /// `mtapi_actionattr_init` defaults: shared across domains, globally
    /// visible, affine to every worker.
    pub fn new(num_workers: usize) -> Self {
        ActionAttributes {
            domain_shared: true,
            global: true,
            affinity: Affinity::all(num_workers),
        }
    }

    pub fn domain_shared(mut self, v: bool) -> Self {
        self.domain_shared = v;
        self
    }

    pub fn global(mut self, v: bool) -> Self {
        self.global = v;
        self
    }

    pub fn affinity(mut self, a: Affinity) -> Self {
        self.affinity = a;
        self
    }
}

pub struct Action {
    pub handle: ActionHandle,
    pub job_id: u32,
    pub body: ActionBody,
    pub attrs: ActionAttributes,
    pub enabled: std::sync::atomic::AtomicBool,
    /// Tasks currently dispatched to this action; read by the job's action
    /// selection rule and decremented on task completion.
    pub in_flight: AtomicUsize,
}

impl Action {
    pub fn new(handle: ActionHandle, job_id: u32, body: ActionBody, attrs: ActionAttributes) -> Self {
        Action {
            handle,
            job_id,
            body,
            attrs,
            enabled: std::sync::atomic::AtomicBool::new(true),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    /// An empty `requested` mask matches nothing (§8: a task with
    /// affinity = empty mask yields `AFFINITY`, it is never treated as
    /// "no restriction").
    pub fn matches_affinity(&self, requested: Affinity) -> bool {
        !requested.is_empty() && !(self.attrs.affinity & requested).is_empty()
    }

    pub fn acquire(&self) {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
    }

    pub fn release(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn load(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }
}

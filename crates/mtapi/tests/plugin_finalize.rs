use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mtapi::{ActionAttributes, CoreCallback, MtapiError, NodeAttributes, PluginAction, Runtime, TaskHandle, TaskOutcome};

struct EchoPlugin {
    finalized: Arc<AtomicBool>,
}

impl PluginAction for EchoPlugin {
    fn start(&self, task: TaskHandle, core: &dyn CoreCallback) {
        core.mark_running(task);
        core.complete(task, TaskOutcome::Success);
    }

    fn cancel(&self, _task: TaskHandle) {}

    fn finalize(&self) {
        self.finalized.store(true, Ordering::SeqCst);
    }
}

/// `delete_action` must invoke a plugin-backed action's `finalize` hook once
/// the action has no tasks left in flight (§4.2).
#[test]
fn delete_action_invokes_plugin_finalize() {
    let rt = Runtime::new(NodeAttributes::default().num_workers(2)).unwrap();

    let finalized = Arc::new(AtomicBool::new(false));
    let plugin = Arc::new(EchoPlugin {
        finalized: Arc::clone(&finalized),
    });

    let action = rt
        .register_plugin_action(40, plugin, ActionAttributes::new(rt.num_workers()))
        .unwrap();

    let task = rt.start_task(40, &[], &mut [], Default::default(), None, None).unwrap();
    assert_eq!(rt.wait_task(task, None), Ok(()));

    assert!(!finalized.load(Ordering::SeqCst));
    rt.delete_action(action, Some(Duration::from_secs(1))).unwrap();
    assert!(finalized.load(Ordering::SeqCst));

    assert_eq!(
        rt.start_task(40, &[], &mut [], Default::default(), None, None).unwrap_err(),
        MtapiError::ActionInvalid
    );
}

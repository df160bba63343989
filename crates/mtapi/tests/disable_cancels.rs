use std::time::Duration;

use mtapi::{ActionAttributes, Affinity, MtapiError, NodeAttributes, QueueAttributes, Runtime, TaskAttributes};

/// Disabling a (non-retaining) queue cancels every task still sitting in its
/// retention buffer without ever running it, and also marks the task already
/// dispatched and running for cooperative cancellation — it is not preempted,
/// but an action body that polls `should_cancel` sees it (§4.6).
#[test]
fn disabling_a_queue_cancels_its_retained_tasks() {
    let rt = Runtime::new(NodeAttributes::default().num_workers(4)).unwrap();

    rt.create_action(
        13,
        |ctx, _args, _result| {
            for _ in 0..200 {
                if ctx.should_cancel() {
                    break;
                }
                std::thread::sleep(Duration::from_millis(1));
            }
            Ok(())
        },
        ActionAttributes::new(rt.num_workers()),
    )
    .unwrap();

    // Ordered queue: only one task at a time holds the ordered slot, so the
    // other 99 land in the retention buffer the moment they're spawned.
    let queue = rt
        .create_queue(13, QueueAttributes::new(0), Affinity::all(rt.num_workers()))
        .unwrap();

    let first = rt
        .start_task(13, &[], &mut [], TaskAttributes::default(), None, Some(queue))
        .unwrap();
    // Give the first task time to actually start running and claim the
    // ordered slot before the rest pile up behind it.
    std::thread::sleep(Duration::from_millis(2));

    let mut rest = Vec::with_capacity(99);
    for _ in 0..99 {
        rest.push(
            rt.start_task(13, &[], &mut [], TaskAttributes::default(), None, Some(queue))
                .unwrap(),
        );
    }

    rt.disable_queue(queue).unwrap();

    // `first` is already dispatched and running; disabling the queue must
    // still flip its cancel flag, so its action body observes it and exits
    // without ever finishing its full 200ms poll loop.
    assert_eq!(rt.wait_task(first, None), Err(MtapiError::ActionCancelled));
    for task in rest {
        assert_eq!(rt.wait_task(task, None), Err(MtapiError::ActionCancelled));
    }
}

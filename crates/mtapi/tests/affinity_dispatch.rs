use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mtapi::{ActionAttributes, Affinity, MtapiError, NodeAttributes, Runtime, TaskAttributes};

/// A task affine to exactly one worker must actually run on that worker,
/// never wherever round-robin dispatch happens to land (§4.3).
#[test]
fn single_worker_affinity_runs_on_the_named_worker() {
    let rt = Runtime::new(NodeAttributes::default().num_workers(4)).unwrap();

    rt.create_action(
        20,
        |ctx, _args, result| {
            result.copy_from_slice(&ctx.current_worker_number().to_le_bytes());
            Ok(())
        },
        ActionAttributes::new(rt.num_workers()),
    )
    .unwrap();

    let mut affinity = Affinity::EMPTY;
    affinity.set(3);
    let attrs = TaskAttributes::default().affinity(affinity);

    let mut out = [0u8; 4];
    let task = rt.start_task(20, &[], &mut out, attrs, None, None).unwrap();
    rt.wait_task(task, None).unwrap();

    assert_eq!(u32::from_le_bytes(out), 3);
}

/// An empty affinity mask is a boundary error, not "no restriction" (§8).
#[test]
fn empty_affinity_is_rejected() {
    let rt = Runtime::new(NodeAttributes::default().num_workers(4)).unwrap();

    rt.create_action(21, |_ctx, _args, _result| Ok(()), ActionAttributes::new(rt.num_workers()))
        .unwrap();

    let attrs = TaskAttributes::default().affinity(Affinity::EMPTY);
    let err = rt.start_task(21, &[], &mut [], attrs, None, None).unwrap_err();
    assert_eq!(err, MtapiError::Affinity);
}

/// An affinity mask naming a worker index past the node's configured worker
/// count is a parameter error, not silently ignored.
#[test]
fn affinity_naming_an_out_of_range_worker_is_rejected() {
    let rt = Runtime::new(NodeAttributes::default().num_workers(2)).unwrap();

    rt.create_action(22, |_ctx, _args, _result| Ok(()), ActionAttributes::new(rt.num_workers()))
        .unwrap();

    let mut affinity = Affinity::EMPTY;
    affinity.set(5);
    let attrs = TaskAttributes::default().affinity(affinity);
    let err = rt.start_task(22, &[], &mut [], attrs, None, None).unwrap_err();
    assert_eq!(err, MtapiError::CoreNum);
}

/// Every instance of a multi-instance task is an independently schedulable
/// unit — with enough workers they can run concurrently on different
/// workers rather than back-to-back on whichever one dequeued the task
/// (§4.3/§4.4).
#[test]
fn multi_instance_task_spreads_across_workers() {
    let rt = Runtime::new(NodeAttributes::default().num_workers(4)).unwrap();

    let workers_seen: Arc<std::sync::Mutex<Vec<u32>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
    let concurrent = Arc::new(AtomicU32::new(0));
    let max_concurrent = Arc::new(AtomicU32::new(0));

    let workers_seen2 = Arc::clone(&workers_seen);
    let concurrent2 = Arc::clone(&concurrent);
    let max_concurrent2 = Arc::clone(&max_concurrent);
    rt.create_action(
        23,
        move |ctx, _args, _result| {
            let now = concurrent2.fetch_add(1, Ordering::SeqCst) + 1;
            max_concurrent2.fetch_max(now, Ordering::SeqCst);
            workers_seen2.lock().unwrap().push(ctx.current_worker_number());
            std::thread::sleep(Duration::from_millis(20));
            concurrent2.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        },
        ActionAttributes::new(rt.num_workers()),
    )
    .unwrap();

    let attrs = TaskAttributes::default().num_instances(4);
    let task = rt.start_task(23, &[], &mut [], attrs, None, None).unwrap();
    rt.wait_task(task, None).unwrap();

    assert_eq!(workers_seen.lock().unwrap().len(), 4);
    assert!(
        max_concurrent.load(Ordering::SeqCst) > 1,
        "instances should overlap across workers instead of running strictly sequentially"
    );
}

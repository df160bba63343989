use std::sync::{Arc, Mutex};

use mtapi::{ActionAttributes, Affinity, NodeAttributes, QueueAttributes, Runtime, TaskAttributes};

/// An ordered queue starts its tasks in submission order even though the
/// worker pool would otherwise run them in whatever order they're picked up
/// (§4.6: "ordering guarantee is about start order, not completion order").
#[test]
fn ordered_queue_starts_tasks_in_submission_order() {
    let rt = Runtime::new(NodeAttributes::default().num_workers(4)).unwrap();
    let log: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));

    let log_for_action = Arc::clone(&log);
    rt.create_action(
        11,
        move |_ctx, args, _result| {
            let n = i32::from_le_bytes(args.try_into().unwrap());
            log_for_action.lock().unwrap().push(n);
            Ok(())
        },
        ActionAttributes::new(rt.num_workers()),
    )
    .unwrap();

    let queue = rt
        .create_queue(11, QueueAttributes::new(0), Affinity::all(rt.num_workers()))
        .unwrap();

    let inputs: Vec<[u8; 4]> = (1..=5i32).map(i32::to_le_bytes).collect();
    let mut tasks = Vec::new();
    for input in &inputs {
        tasks.push(
            rt.start_task(11, input, &mut [], TaskAttributes::default(), None, Some(queue))
                .unwrap(),
        );
    }
    for task in tasks {
        rt.wait_task(task, None).unwrap();
    }

    assert_eq!(*log.lock().unwrap(), vec![1, 2, 3, 4, 5]);
}

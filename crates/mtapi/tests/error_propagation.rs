use mtapi::{ActionAttributes, MtapiError, NodeAttributes, Runtime, TaskAttributes};

#[test]
fn reported_status_propagates_to_wait() {
    let rt = Runtime::new(NodeAttributes::default().num_workers(2)).unwrap();

    rt.create_action(
        9,
        |ctx, _args, _result| {
            ctx.set_status(MtapiError::ActionFailed);
            Ok(())
        },
        ActionAttributes::new(rt.num_workers()),
    )
    .unwrap();

    let task = rt
        .start_task(9, &[], &mut [], TaskAttributes::default(), None, None)
        .unwrap();

    assert_eq!(rt.wait_task(task, None), Err(MtapiError::ActionFailed));
}

#[test]
fn returned_err_propagates_to_wait() {
    let rt = Runtime::new(NodeAttributes::default().num_workers(2)).unwrap();

    rt.create_action(
        10,
        |_ctx, _args, _result| Err(MtapiError::Parameter),
        ActionAttributes::new(rt.num_workers()),
    )
    .unwrap();

    let task = rt
        .start_task(10, &[], &mut [], TaskAttributes::default(), None, None)
        .unwrap();

    assert_eq!(rt.wait_task(task, None), Err(MtapiError::Parameter));
}

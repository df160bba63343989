use mtapi::{ActionAttributes, NodeAttributes, Runtime, TaskAttributes};

#[test]
fn single_shot_echoes_input_into_result() {
    let rt = Runtime::new(NodeAttributes::default().num_workers(2)).unwrap();

    rt.create_action(
        42,
        |_ctx, args, result| {
            result[..args.len()].copy_from_slice(args);
            Ok(())
        },
        ActionAttributes::new(rt.num_workers()),
    )
    .unwrap();

    let mut out = [0u8; 5];
    let task = rt
        .start_task(42, b"hello", &mut out, TaskAttributes::default(), None, None)
        .unwrap();
    rt.wait_task(task, None).unwrap();

    assert_eq!(&out, b"hello");
}

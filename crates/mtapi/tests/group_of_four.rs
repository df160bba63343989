use mtapi::{ActionAttributes, MtapiError, NodeAttributes, Runtime, TaskAttributes};

#[test]
fn group_of_four_drains_exactly_once_each() {
    let rt = Runtime::new(NodeAttributes::default().num_workers(4)).unwrap();

    rt.create_action(
        5,
        |_ctx, args, result| {
            result.copy_from_slice(args);
            Ok(())
        },
        ActionAttributes::new(rt.num_workers()),
    )
    .unwrap();

    let group = rt.create_group().unwrap();

    let inputs: Vec<[u8; 4]> = (0..4i32).map(i32::to_le_bytes).collect();
    let mut outputs = vec![[0u8; 4]; 4];
    for i in 0..4 {
        let attrs = TaskAttributes::default().user_data(i as u64);
        rt.start_task(5, &inputs[i], &mut outputs[i], attrs, Some(group), None)
            .unwrap();
    }

    let mut seen_tags = Vec::new();
    for _ in 0..4 {
        seen_tags.push(rt.wait_any(group, None).unwrap());
    }
    seen_tags.sort();
    assert_eq!(seen_tags, vec![0, 1, 2, 3]);

    let mut values: Vec<i32> = outputs.iter().map(|b| i32::from_le_bytes(*b)).collect();
    values.sort();
    assert_eq!(values, vec![0, 1, 2, 3]);

    assert_eq!(rt.wait_any(group, None), Err(MtapiError::GroupCompleted));
}

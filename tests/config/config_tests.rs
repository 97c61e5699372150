use gmachine::{
    EvalConfig, EvalError, Evaluator, Expr, HeapConfig, Limit, NodeHeap, SlotState,
    primop::PrimOp,
};

#[test]
fn eval_config_from_json_drives_the_evaluator() {
    let config = EvalConfig::from_json(
        r#"{
            "max_steps": 3,
            "wait_poll_ms": 2,
            "trace": false
        }"#,
    )
    .unwrap();
    assert_eq!(config.max_steps, Some(3));
    assert_eq!(config.wait_poll().as_millis(), 2);

    let heap = NodeHeap::new();
    let root = heap
        .alloc_thunk(
            Expr::prim(
                PrimOp::IAdd,
                vec![Expr::int(1), Expr::prim(PrimOp::IAdd, vec![Expr::int(2), Expr::int(3)])],
            ),
            Vec::new(),
        )
        .unwrap();
    assert_eq!(
        Evaluator::with_config(&heap, config).force(root),
        Err(EvalError::ResourceExhausted(Limit::Steps(3)))
    );
}

#[test]
fn eval_config_round_trips_through_serde() {
    let config = EvalConfig {
        max_work_stack: 64,
        max_steps: Some(1_000),
        time_limit_ms: Some(250),
        trace: true,
        wait_poll_ms: 7,
    };
    let text = serde_json::to_string(&config).unwrap();
    assert_eq!(EvalConfig::from_json(&text).unwrap(), config);
}

#[test]
fn unknown_field_types_are_rejected() {
    assert!(EvalConfig::from_json(r#"{ "max_steps": "lots" }"#).is_err());
    assert!(HeapConfig::from_json(r#"{ "gc_enabled": 1 }"#).is_err());
}

#[test]
fn heap_node_limit_fails_allocation_during_reduction() {
    let config = HeapConfig::from_json(r#"{ "max_nodes": 3 }"#).unwrap();
    assert_eq!(config.max_nodes, Some(3));
    let heap = NodeHeap::with_config(&config);

    // Building four boxed fields needs more nodes than the heap allows.
    let expr = Expr::construct(
        0,
        "Quad",
        vec![
            Expr::prim(PrimOp::IAdd, vec![Expr::int(1), Expr::int(1)]),
            Expr::prim(PrimOp::IAdd, vec![Expr::int(2), Expr::int(2)]),
            Expr::prim(PrimOp::IAdd, vec![Expr::int(3), Expr::int(3)]),
            Expr::prim(PrimOp::IAdd, vec![Expr::int(4), Expr::int(4)]),
        ],
    );
    let root = heap.alloc_thunk(expr, Vec::new()).unwrap();
    let mut evaluator = Evaluator::new(&heap);
    assert_eq!(
        evaluator.force(root),
        Err(EvalError::ResourceExhausted(Limit::Heap(3)))
    );
    assert_eq!(heap.state(root), Ok(SlotState::Unevaluated));
    assert!(evaluator.update_markers().is_empty());
}

#[test]
fn heap_config_sets_threshold_and_switch() {
    let config = HeapConfig::from_json(r#"{ "gc_threshold": 4096, "gc_enabled": false }"#).unwrap();
    let heap = NodeHeap::with_config(&config);
    assert_eq!(heap.threshold(), 4096);
    assert!(!heap.should_collect());
}

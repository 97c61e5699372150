use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use gmachine::{
    CancelToken, EvalConfig, EvalError, Evaluator, Expr, HostValue, Lambda, Limit, NativeFn, Node,
    NodeHeap, NodeId, SlotState, primop::PrimOp,
};

/// `let spin = \n -> n `seq` spin (n + 1) in spin 0`, which never finishes
/// but never revisits a thunk either.
fn spinning(heap: &NodeHeap) -> NodeId {
    let spin = Lambda::new(
        "spin",
        1,
        1,
        Expr::seq(
            Expr::var(1),
            Expr::apply(
                Expr::var(0),
                vec![Expr::prim(PrimOp::IAdd, vec![Expr::var(1), Expr::int(1)])],
            ),
        ),
    );
    let expr = Expr::let_rec(
        vec![Expr::lambda(spin, vec![0])],
        Expr::apply(Expr::var(0), vec![Expr::int(0)]),
    );
    heap.alloc_thunk(expr, Vec::new()).unwrap()
}

#[test]
fn cancel_from_another_thread_stops_a_running_reduction() {
    let _ = env_logger::builder().is_test(true).try_init();
    let heap = NodeHeap::new();
    let root = spinning(&heap);
    let token = CancelToken::new();

    let result = thread::scope(|scope| {
        let worker = {
            let token = token.clone();
            let heap = &heap;
            scope.spawn(move || {
                let mut evaluator = Evaluator::new(heap).with_cancel(token);
                let result = evaluator.force(root);
                (result, evaluator.update_markers())
            })
        };
        thread::sleep(Duration::from_millis(30));
        token.cancel();
        worker.join().unwrap()
    });

    assert_eq!(result.0, Err(EvalError::ResourceExhausted(Limit::Cancelled)));
    assert!(result.1.is_empty());
    assert_eq!(heap.state(root), Ok(SlotState::Unevaluated));
}

#[test]
fn time_limit_stops_a_running_reduction() {
    let heap = NodeHeap::new();
    let root = spinning(&heap);
    let config = EvalConfig {
        time_limit_ms: Some(25),
        ..EvalConfig::default()
    };

    let mut evaluator = Evaluator::with_config(&heap, config);
    assert_eq!(
        evaluator.force(root),
        Err(EvalError::ResourceExhausted(Limit::Deadline))
    );
    assert_eq!(heap.state(root), Ok(SlotState::Unevaluated));
    assert!(evaluator.steps() > 0);
}

#[test]
fn step_budget_stops_a_running_reduction() {
    let heap = NodeHeap::new();
    let root = spinning(&heap);
    let config = EvalConfig::default().with_max_steps(5_000);
    assert_eq!(
        Evaluator::with_config(&heap, config).force(root),
        Err(EvalError::ResourceExhausted(Limit::Steps(5_000)))
    );
    assert_eq!(heap.state(root), Ok(SlotState::Unevaluated));
}

#[test]
fn heap_stays_usable_after_cancellation() {
    let heap = NodeHeap::new();
    let root = spinning(&heap);
    let token = CancelToken::new();
    token.cancel();
    assert!(Evaluator::new(&heap).with_cancel(token).force(root).is_err());

    // Partial results of the aborted call are still valid nodes.
    let other = heap
        .alloc_thunk(
            Expr::prim(PrimOp::IMul, vec![Expr::int(6), Expr::int(7)]),
            Vec::new(),
        )
        .unwrap();
    let id = Evaluator::new(&heap).force(other).unwrap();
    assert_eq!(heap.value(id), Ok(Some(HostValue::Int(42))));
}

#[test]
fn blocked_waiter_can_be_cancelled() {
    let entered = Arc::new(AtomicBool::new(false));
    let open = Arc::new(AtomicBool::new(false));
    let hold = {
        let entered = entered.clone();
        let open = open.clone();
        NativeFn::new("hold", 0, move |_| {
            entered.store(true, Ordering::SeqCst);
            while !open.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
            Ok(Node::Int(1))
        })
    };
    let heap = NodeHeap::new();
    let shared = heap.alloc_thunk(Expr::native(hold, vec![]), Vec::new()).unwrap();
    let token = CancelToken::new();
    let config = EvalConfig {
        wait_poll_ms: 1,
        ..EvalConfig::default()
    };

    thread::scope(|scope| {
        let owner = scope.spawn(|| Evaluator::new(&heap).force(shared));
        while !entered.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }

        let waiter = {
            let token = token.clone();
            let config = config.clone();
            let heap = &heap;
            scope.spawn(move || {
                Evaluator::with_config(heap, config)
                    .with_cancel(token)
                    .force(shared)
            })
        };
        thread::sleep(Duration::from_millis(10));
        token.cancel();
        assert_eq!(
            waiter.join().unwrap(),
            Err(EvalError::ResourceExhausted(Limit::Cancelled))
        );

        // The owner's claim is untouched by the waiter giving up.
        assert!(matches!(heap.state(shared), Ok(SlotState::InProgress(_))));
        open.store(true, Ordering::SeqCst);
        assert_eq!(owner.join().unwrap(), Ok(shared));
    });

    assert_eq!(heap.value(shared), Ok(Some(HostValue::Int(1))));
}

use std::{
    sync::{
        Arc, Barrier,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use gmachine::{
    EvalConfig, Evaluator, Expr, HostValue, NativeFn, Node, NodeHeap, SlotState, force_parallel,
    primop::PrimOp,
};

fn slow_counter(counter: &Arc<AtomicUsize>, result: i64) -> NativeFn {
    let counter = counter.clone();
    NativeFn::new("slow", 0, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        Ok(Node::Int(result))
    })
}

#[test]
fn heap_and_nodes_are_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<NodeHeap>();
    assert_send_sync::<Node>();
    assert_send_sync::<Expr>();
}

#[test]
fn two_actors_forcing_one_thunk_evaluate_it_once() {
    let _ = env_logger::builder().is_test(true).try_init();
    let counter = Arc::new(AtomicUsize::new(0));
    let heap = NodeHeap::new();
    let shared = heap
        .alloc_thunk(Expr::native(slow_counter(&counter, 42), vec![]), Vec::new())
        .unwrap();

    let start = Barrier::new(2);
    let (left, right) = thread::scope(|scope| {
        let run = || {
            start.wait();
            Evaluator::new(&heap).force(shared)
        };
        let left = scope.spawn(run);
        let right = scope.spawn(run);
        (left.join().unwrap(), right.join().unwrap())
    });

    let left = left.unwrap();
    assert_eq!(left, right.unwrap());
    assert_eq!(heap.value(left), Ok(Some(HostValue::Int(42))));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(heap.state(shared), Ok(SlotState::Evaluated));
}

#[test]
fn many_threads_agree_on_a_shared_structure() {
    let counter = Arc::new(AtomicUsize::new(0));
    let heap = NodeHeap::new();
    let shared = heap
        .alloc_thunk(
            Expr::seq(
                Expr::native(slow_counter(&counter, 0), vec![]),
                Expr::construct(1, "Pair", vec![Expr::int(1), Expr::int(2)]),
            ),
            Vec::new(),
        )
        .unwrap();

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| Evaluator::new(&heap).force(shared)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for result in &results {
        assert_eq!(result, &Ok(shared));
    }
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(heap.ordinal(shared), Ok(1));
}

#[test]
fn force_parallel_shares_common_subgraphs() {
    let counter = Arc::new(AtomicUsize::new(0));
    let heap = NodeHeap::new();
    let shared = heap
        .alloc_thunk(Expr::native(slow_counter(&counter, 10), vec![]), Vec::new())
        .unwrap();
    let roots: Vec<_> = (0..16)
        .map(|i| {
            let expr = Expr::prim(PrimOp::IAdd, vec![Expr::global(shared), Expr::int(i)]);
            heap.alloc_thunk(expr, Vec::new()).unwrap()
        })
        .collect();

    let results = force_parallel(&heap, &roots, &EvalConfig::default());
    assert_eq!(results.len(), roots.len());
    for (i, result) in results.into_iter().enumerate() {
        let id = result.unwrap();
        assert_eq!(heap.value(id), Ok(Some(HostValue::Int(10 + i as i64))));
    }
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn waiting_actor_sees_result_of_owner() {
    // The owner is mid-evaluation when the second actor arrives.
    let started = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let gate = {
        let started = started.clone();
        let release = release.clone();
        NativeFn::new("gate", 0, move |_| {
            started.wait();
            release.wait();
            Ok(Node::str("done"))
        })
    };
    let heap = NodeHeap::new();
    let shared = heap.alloc_thunk(Expr::native(gate, vec![]), Vec::new()).unwrap();

    thread::scope(|scope| {
        let owner = scope.spawn(|| {
            let mut evaluator = Evaluator::new(&heap);
            let result = evaluator.force(shared);
            (evaluator.actor(), result)
        });

        started.wait();
        let claimed = heap.state(shared).unwrap();
        assert!(matches!(claimed, SlotState::InProgress(_)));

        let waiter = scope.spawn(|| Evaluator::new(&heap).force(shared));
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());
        release.wait();

        let (owner_actor, owned) = owner.join().unwrap();
        assert_eq!(claimed, SlotState::InProgress(owner_actor));
        assert_eq!(waiter.join().unwrap(), owned);
    });

    assert_eq!(heap.brief_summary(shared), "\"done\"");
}

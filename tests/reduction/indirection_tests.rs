use gmachine::{DataType, EvalError, Evaluator, Expr, HostValue, Node, NodeHeap, NodeId};

fn build_chain(heap: &NodeHeap, target: NodeId, links: usize) -> Vec<NodeId> {
    let mut chain = Vec::with_capacity(links);
    let mut next = target;
    for _ in 0..links {
        next = heap.alloc_indirection(next).unwrap();
        chain.push(next);
    }
    chain
}

fn points_at(heap: &NodeHeap, link: NodeId, target: NodeId) -> bool {
    matches!(heap.node(link), Ok(Node::Indirection(t)) if t == target)
}

#[test]
fn chains_of_any_length_collapse_after_one_force() {
    for links in [1, 2, 3, 10, 1_000] {
        let heap = NodeHeap::new();
        let value = heap.alloc_str("end").unwrap();
        let chain = build_chain(&heap, value, links);
        let head = *chain.last().unwrap();

        assert_eq!(Evaluator::new(&heap).force(head), Ok(value));
        for link in &chain {
            assert!(points_at(&heap, *link, value), "{} links", links);
        }
    }
}

#[test]
fn forcing_from_the_middle_collapses_the_tail() {
    let heap = NodeHeap::new();
    let value = heap.alloc_int(1).unwrap();
    let chain = build_chain(&heap, value, 6);

    assert_eq!(Evaluator::new(&heap).force(chain[3]), Ok(value));
    for link in &chain[..=3] {
        assert!(points_at(&heap, *link, value));
    }
    // Links above the forced one are untouched.
    assert!(points_at(&heap, chain[4], chain[3]));
}

#[test]
fn chain_through_a_thunk_ends_at_the_updated_thunk() {
    let heap = NodeHeap::new();
    let thunk = heap
        .alloc_thunk(Expr::construct(0, "Unit", vec![]), Vec::new())
        .unwrap();
    let chain = build_chain(&heap, thunk, 4);

    let id = Evaluator::new(&heap).force(chain[3]).unwrap();
    assert_eq!(id, thunk);
    assert_eq!(heap.data_type(thunk), Ok(DataType::Constructor));
    for link in &chain {
        assert!(points_at(&heap, *link, thunk));
    }
}

#[test]
fn repeated_forcing_does_not_grow_chains() {
    // Each thunk evaluates to the same existing constructor.
    let heap = NodeHeap::new();
    let cell = heap.alloc_constructor(2, "Leaf", vec![]).unwrap();
    let thunks: Vec<_> = (0..4)
        .map(|_| heap.alloc_thunk(Expr::global(cell), Vec::new()).unwrap())
        .collect();

    let mut evaluator = Evaluator::new(&heap);
    for _ in 0..3 {
        for thunk in &thunks {
            assert_eq!(evaluator.force(*thunk), Ok(cell));
            assert!(points_at(&heap, *thunk, cell));
        }
    }
    assert_eq!(heap.data_type(cell), Ok(DataType::Constructor));
}

#[test]
fn thunk_returning_another_thunk_shares_its_result() {
    let heap = NodeHeap::new();
    let inner = heap
        .alloc_thunk(Expr::construct(1, "Some", vec![Expr::int(2)]), Vec::new())
        .unwrap();
    let outer = heap.alloc_thunk(Expr::global(inner), Vec::new()).unwrap();

    assert_eq!(Evaluator::new(&heap).force(outer), Ok(inner));
    assert!(points_at(&heap, outer, inner));
    assert_eq!(heap.ordinal(outer), Ok(1));
}

#[test]
fn indirection_to_scalar_reads_through() {
    let heap = NodeHeap::new();
    let value = heap.alloc_double(2.5).unwrap();
    let link = heap.alloc_indirection(value).unwrap();
    assert_eq!(heap.value(link), Ok(Some(HostValue::Double(2.5))));
    assert_eq!(heap.resolve(link), Ok(value));
}

#[test]
fn self_loop_is_non_termination() {
    let heap = NodeHeap::new();
    let ids = heap
        .alloc_recursive(1, |ids| vec![Node::Indirection(ids[0])])
        .unwrap();
    assert!(matches!(heap.resolve(ids[0]), Err(EvalError::NonTermination { .. })));
    assert!(matches!(
        Evaluator::new(&heap).force(ids[0]),
        Err(EvalError::NonTermination { .. })
    ));
}

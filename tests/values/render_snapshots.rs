use std::sync::{Arc, Mutex, OnceLock};

use gmachine::{
    Evaluator, Expr, NativeFn, Node, NodeHeap, NodeId, ViewState, primop::PrimOp,
    runtime::render::to_json,
};

#[test]
fn forced_constructor_shows_lazy_fields() {
    let heap = NodeHeap::new();
    let root = heap
        .alloc_thunk(
            Expr::construct(
                1,
                "Cons",
                vec![
                    Expr::char('a'),
                    Expr::prim(PrimOp::IAdd, vec![Expr::int(1), Expr::int(2)]),
                ],
            ),
            Vec::new(),
        )
        .unwrap();
    insta::assert_snapshot!(heap.render(root, 0), @"THUNK@0 <unevaluated>");

    Evaluator::new(&heap).force(root).unwrap();
    insta::assert_snapshot!(heap.render(root, 0), @r"
    CONSTRUCTOR@0 Cons#1
      CHAR@1 <a>
      THUNK@2 <unevaluated>
    ");

    let tail = match heap.node(root).unwrap() {
        Node::Constructor(cell) => cell.args[1],
        other => panic!("expected constructor, got {:?}", other),
    };
    Evaluator::new(&heap).force(tail).unwrap();
    insta::assert_snapshot!(heap.render(root, 0), @r"
    CONSTRUCTOR@0 Cons#1
      CHAR@1 <a>
      INT@2 <3>
    ");
}

#[test]
fn claimed_thunk_renders_its_owner_mid_reduction() {
    let heap = Arc::new(NodeHeap::new());
    let root_id: Arc<OnceLock<NodeId>> = Arc::new(OnceLock::new());
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let peek = {
        let heap = Arc::downgrade(&heap);
        let root_id = root_id.clone();
        let seen = seen.clone();
        NativeFn::new("peek", 0, move |_| {
            if let (Some(heap), Some(root)) = (heap.upgrade(), root_id.get()) {
                let views = heap.graph_view(*root);
                let mut seen = seen.lock().unwrap();
                seen.push(heap.render(*root, 0));
                seen.push(format!("{:?}", views[0].state));
            }
            Ok(Node::Int(0))
        })
    };

    let root = heap
        .alloc_thunk(Expr::seq(Expr::native(peek, vec![]), Expr::char('Q')), Vec::new())
        .unwrap();
    root_id.set(root).unwrap();

    let mut evaluator = Evaluator::new(&heap);
    let actor = evaluator.actor().get();
    evaluator.force(root).unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0], format!("THUNK@0 <in progress: actor {}>", actor));
    assert_eq!(seen[1], format!("{:?}", ViewState::InProgress { actor }));
    insta::assert_snapshot!(heap.render(root, 0), @"CHAR@0 <Q>");
}

#[test]
fn shared_and_cyclic_structure_renders_finitely() {
    // let xs = Cons 'x' ys; ys = Cons 'y' xs in Pair xs ys
    let heap = NodeHeap::new();
    let expr = Expr::let_rec(
        vec![
            Expr::construct(1, "Cons", vec![Expr::char('x'), Expr::var(1)]),
            Expr::construct(1, "Cons", vec![Expr::char('y'), Expr::var(0)]),
        ],
        Expr::construct(0, "Pair", vec![Expr::var(0), Expr::var(1)]),
    );
    let root = heap.alloc_thunk(expr, Vec::new()).unwrap();
    let mut evaluator = Evaluator::new(&heap);
    evaluator.force(root).unwrap();

    let (xs, ys) = match heap.node(root).unwrap() {
        Node::Constructor(cell) => (cell.args[0], cell.args[1]),
        other => panic!("expected constructor, got {:?}", other),
    };
    evaluator.force(xs).unwrap();
    evaluator.force(ys).unwrap();

    insta::assert_snapshot!(heap.render(root, 0), @r"
    CONSTRUCTOR@0 Pair#0
      CONSTRUCTOR@1 Cons#1
        CHAR@3 <x>
        CONSTRUCTOR@2 Cons#1
          CHAR@4 <y>
          ^CONSTRUCTOR@1
      ^CONSTRUCTOR@2
    ");
}

#[test]
fn graph_view_serializes_to_json() {
    let heap = NodeHeap::new();
    let inner = heap.alloc_int(7).unwrap();
    let root = heap.alloc_constructor(1, "Just", vec![inner]).unwrap();

    let views = heap.graph_view(root);
    let json: serde_json::Value = serde_json::from_str(&to_json(&views)).unwrap();
    assert_eq!(json[0]["data_type"], "CONSTRUCTOR");
    assert_eq!(json[0]["summary"], "Just");
    assert_eq!(json[0]["state"], "evaluated");
    assert_eq!(json[1]["summary"], "7");
    assert_eq!(json[0]["references"][0]["index"], json[1]["id"]["index"]);
}

use gmachine::{DataType, EvalError, Evaluator, Expr, HostValue, Node, NodeHeap};

#[test]
fn every_code_point_is_a_whnf_char() {
    let mut count = 0u32;
    for code in 0..=u32::from(char::MAX) {
        let Some(c) = char::from_u32(code) else {
            continue;
        };
        let node = Node::Char(c);
        assert_eq!(node.data_type(), DataType::Char);
        assert!(node.data_type().is_whnf());
        assert_eq!(node.ordinal(), Ok(code));
        assert_eq!(node.value(), Some(HostValue::Char(c)));
        count += 1;
    }
    // Surrogates are not scalar values.
    assert_eq!(count, 0x11_0000 - 0x800);
}

#[test]
fn char_q_properties() {
    let heap = NodeHeap::new();
    let id = heap.alloc_char('Q').unwrap();

    assert_eq!(heap.data_type(id), Ok(DataType::Char));
    assert_eq!(heap.ordinal(id), Ok(81));
    assert_eq!(heap.brief_summary(id), "Q");
    assert_eq!(heap.value(id), Ok(Some(HostValue::Char('Q'))));

    let rendered = heap.render(id, 2);
    assert!(rendered.starts_with("  CHAR@"));
    assert!(rendered.contains('Q'));
}

#[test]
fn char_forces_to_itself() {
    let heap = NodeHeap::new();
    let id = heap.alloc_char('λ').unwrap();
    let mut evaluator = Evaluator::new(&heap);
    assert_eq!(evaluator.force(id), Ok(id));
    assert_eq!(heap.ordinal(id), Ok(0x3bb));
}

#[test]
fn boundary_code_points_through_the_heap() {
    let heap = NodeHeap::new();
    for c in ['\0', '\u{d7ff}', '\u{e000}', char::MAX] {
        let id = heap.alloc_char(c).unwrap();
        assert_eq!(heap.ordinal(id), Ok(u32::from(c)));
        assert_eq!(heap.brief_summary(id), c.to_string());
    }
}

#[test]
fn ordinal_of_non_enumerable_is_type_mismatch() {
    let heap = NodeHeap::new();
    let id = heap.alloc_double(1.5).unwrap();
    assert!(matches!(
        heap.ordinal(id),
        Err(EvalError::TypeMismatch { found: DataType::Double, .. })
    ));
}

#[test]
fn thunk_producing_char_is_overwritten_in_place() {
    let heap = NodeHeap::new();
    let thunk = heap.alloc_thunk(Expr::char('Q'), Vec::new()).unwrap();
    assert_eq!(heap.data_type(thunk), Ok(DataType::Thunk));

    let id = Evaluator::new(&heap).force(thunk).unwrap();
    assert_eq!(id, thunk);
    assert_eq!(heap.data_type(thunk), Ok(DataType::Char));
    assert_eq!(heap.ordinal(thunk), Ok(81));
}

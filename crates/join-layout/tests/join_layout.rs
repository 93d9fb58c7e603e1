//! Join output and intermediate tuple layout tests

mod common;

use common::{TestPlanner, int};
use proven_join_layout::types::{BinaryOp, TupleIsNull};
use proven_join_layout::{
    DataType, Expr, JoinAlgorithm, JoinNode, JoinOperator, JoinRelation, JoinedRow,
    LayoutConfig, NullSide, SubstitutionMap, TupleId, Value,
};

fn tuple_is_null_sides(expr: &Expr, out: &mut Vec<NullSide>) {
    if let Expr::TupleIsNull(TupleIsNull { side, .. }) = expr {
        out.push(*side);
    }
    for child in expr.children() {
        tuple_is_null_sides(child, out);
    }
}

fn wrapped_sides(join: &JoinNode) -> Vec<Option<NullSide>> {
    join.src_to_output_smap()
        .unwrap()
        .sources()
        .map(|source| {
            let mut sides = Vec::new();
            tuple_is_null_sides(source, &mut sides);
            sides.first().copied()
        })
        .collect()
}

#[test]
fn test_inner_join_copies_every_column() {
    let mut planner = TestPlanner::new();
    let t1 = planner.base_table("t1", &[int("a"), int("b")]);
    let t2 = planner.base_table("t2", &[int("c"), int("d"), int("e")]);
    let join = planner.join(t1.node, t2.node, JoinOperator::Inner);

    let slots = planner.output_slots(&join);
    assert_eq!(slots.len(), 5);
    assert!(slots.iter().all(|s| !planner.is_nullable(*s)));
    assert!(wrapped_sides(&join).iter().all(Option::is_none));

    let output = join.output_tuple().unwrap();
    join.src_to_output_smap()
        .unwrap()
        .check_slot_targets(&[output])
        .unwrap();
    let layout = planner.catalog.tuple(output).unwrap().layout().unwrap().clone();
    assert_eq!(layout.num_null_bytes, 0);
    assert_eq!(layout.byte_size, 20);
}

#[test]
fn test_nullability_table_for_every_join_kind() {
    for op in JoinOperator::ALL {
        let mut planner = TestPlanner::new();
        let t1 = planner.base_table("t1", &[int("a"), int("b")]);
        let t2 = planner.base_table("t2", &[int("c"), int("d"), int("e")]);
        let (left_slots, right_slots) = (t1.slots.clone(), t2.slots.clone());
        let join = planner.join(t1.node, t2.node, op);
        let rules = op.output_rules();

        let slots = planner.output_slots(&join);
        let expected = rules.copy_left as usize * 2 + rules.copy_right as usize * 3;
        assert_eq!(slots.len(), expected, "{}", op);

        for slot in slots {
            let desc = planner.catalog.slot(slot).unwrap();
            let source = desc.source_exprs()[0].as_slot_ref().unwrap().slot;
            if left_slots.contains(&source) {
                assert_eq!(desc.is_nullable(), rules.left_nullable, "{} left", op);
            } else {
                assert!(right_slots.contains(&source), "{}", op);
                assert_eq!(desc.is_nullable(), rules.right_nullable, "{} right", op);
            }
        }
        assert!(
            planner
                .catalog
                .tuple(join.output_tuple().unwrap())
                .unwrap()
                .is_finalized()
        );
    }
}

#[test]
fn test_left_outer_join_wraps_inline_view_columns() {
    let mut planner = TestPlanner::new();
    let t1 = planner.base_table("t1", &[int("a")]);
    let view = planner.inline_view_with("v", &[int("x")], |base| {
        vec![base[0].clone(), Expr::literal(7)]
    });
    let view_tuple = view.view;
    let join = planner.join(t1.node, view.node, JoinOperator::LeftOuter);

    let slots = planner.output_slots(&join);
    assert_eq!(slots.len(), 3);
    assert!(!planner.is_nullable(slots[0]));
    assert!(planner.is_nullable(slots[1]));
    assert!(planner.is_nullable(slots[2]));
    assert_eq!(
        wrapped_sides(&join),
        vec![None, Some(NullSide::Right), Some(NullSide::Right)]
    );

    // The view's constant column was read through the join
    let constant_slot = planner.catalog.tuple(view_tuple).unwrap().slot_ids()[1];
    assert!(planner.catalog.slot(constant_slot).unwrap().is_materialized());

    // Row level: a missing right row turns every view column NULL together
    let left = join.intermediate_tuples()[0];
    let right = join.intermediate_tuples()[1];
    let left_slot = planner.slots_of(left)[0];
    let right_slot = planner.slots_of(right)[0];
    let sources: Vec<Expr> = join.src_to_output_smap().unwrap().sources().cloned().collect();

    let unmatched = JoinedRow::new().with_value(left_slot, 1).with_absent(right);
    let values: Vec<Value> = sources.iter().map(|s| unmatched.eval(s).unwrap()).collect();
    assert_eq!(values, vec![Value::I32(1), Value::Null, Value::Null]);

    let matched = JoinedRow::new()
        .with_value(left_slot, 1)
        .with_value(right_slot, 5);
    let values: Vec<Value> = sources.iter().map(|s| matched.eval(s).unwrap()).collect();
    assert_eq!(values, vec![Value::I32(1), Value::I32(5), Value::I32(7)]);
}

#[test]
fn test_null_side_stays_nullable_without_wrapping() {
    let mut planner = TestPlanner::new();
    let t1 = planner.base_table("t1", &[int("a")]);
    let view = planner.inline_view_with("v", &[int("x")], |_| vec![Expr::literal(7)]);
    let join = planner.join_with(
        t1.node,
        view.node,
        JoinOperator::LeftOuter,
        JoinAlgorithm::nested_loop(),
        LayoutConfig::default().with_null_side_wrapping(false),
    );
    assert_eq!(wrapped_sides(&join), vec![None, None]);

    // The constant source itself can never be NULL
    let smap = join.src_to_output_smap().unwrap();
    let constant = smap.sources().nth(1).unwrap();
    assert!(!constant.is_nullable(&planner.catalog).unwrap());

    let slots = planner.output_slots(&join);
    assert!(!planner.is_nullable(slots[0]));
    assert!(planner.is_nullable(slots[1]));
    let output = planner.catalog.tuple(join.output_tuple().unwrap()).unwrap();
    assert_eq!(output.layout().unwrap().num_null_bytes, 1);
}

#[test]
fn test_full_outer_constant_views_guard_their_own_side() {
    let mut planner = TestPlanner::new();
    let (left, _) = planner.constant_view("l", &[1]);
    let (right, _) = planner.constant_view("r", &[2]);
    let join = planner.join(left, right, JoinOperator::FullOuter);
    assert_eq!(
        wrapped_sides(&join),
        vec![Some(NullSide::Left), Some(NullSide::Right)]
    );

    let left_tuple = join.intermediate_tuples()[0];
    let right_tuple = join.intermediate_tuples()[1];
    let sources: Vec<Expr> = join.src_to_output_smap().unwrap().sources().cloned().collect();
    let guarded: Vec<Vec<TupleId>> = sources
        .iter()
        .map(|source| match source {
            Expr::If(cond, _, _) => match cond.as_ref() {
                Expr::TupleIsNull(predicate) => predicate.tuple_ids.clone(),
                other => panic!("unexpected guard {}", other),
            },
            other => panic!("unguarded source {}", other),
        })
        .collect();
    assert_eq!(guarded, vec![vec![left_tuple], vec![right_tuple]]);

    let left_missing = JoinedRow::new().with_absent(left_tuple);
    let values: Vec<Value> = sources.iter().map(|s| left_missing.eval(s).unwrap()).collect();
    assert_eq!(values, vec![Value::Null, Value::I32(2)]);

    let right_missing = JoinedRow::new().with_absent(right_tuple);
    let values: Vec<Value> = sources.iter().map(|s| right_missing.eval(s).unwrap()).collect();
    assert_eq!(values, vec![Value::I32(1), Value::Null]);
}

#[test]
fn test_right_and_full_outer_tag_the_null_side() {
    let mut planner = TestPlanner::new();
    let view = planner.inline_view("v", &[int("x"), int("y")]);
    let t2 = planner.base_table("t2", &[int("a")]);
    let join = planner.join(view.node, t2.node, JoinOperator::RightOuter);
    assert_eq!(
        wrapped_sides(&join),
        vec![Some(NullSide::Left), Some(NullSide::Left), None]
    );

    let mut planner = TestPlanner::new();
    let left = planner.inline_view("l", &[int("x")]);
    let right = planner.inline_view("r", &[int("y"), int("z")]);
    let (left_base, right_base) = (left.base, right.base);
    let join = planner.join(left.node, right.node, JoinOperator::FullOuter);
    assert_eq!(
        wrapped_sides(&join),
        vec![
            Some(NullSide::Left),
            Some(NullSide::Right),
            Some(NullSide::Right)
        ]
    );
    assert!(planner.output_slots(&join).iter().all(|s| planner.is_nullable(*s)));
    assert_eq!(join.nullable_tuple_ids(), &[left_base, right_base]);
}

#[test]
fn test_base_table_on_null_side_is_not_wrapped() {
    let mut planner = TestPlanner::new();
    let t1 = planner.base_table("t1", &[int("a")]);
    let t2 = planner.base_table("t2", &[int("b")]);
    let join = planner.join(t1.node, t2.node, JoinOperator::LeftOuter);
    assert_eq!(wrapped_sides(&join), vec![None, None]);
    let slots = planner.output_slots(&join);
    assert!(planner.is_nullable(slots[1]));
}

#[test]
fn test_left_semi_join_outputs_left_columns_only() {
    let mut planner = TestPlanner::new();
    let t1 = planner.base_table("t1", &[int("a"), int("b")]);
    let t2 = planner.base_table("t2", &[int("c")]);
    let (left_tuple, right_tuple) = (t1.tuple, t2.tuple);
    let join = planner.join(t1.node, t2.node, JoinOperator::LeftSemi);

    let slots = planner.output_slots(&join);
    assert_eq!(slots.len(), 2);
    for slot in slots {
        let source = planner.catalog.slot(slot).unwrap().source_exprs()[0].clone();
        assert!(source.is_bound(&[left_tuple]));
        assert!(!source.is_bound(&[right_tuple]));
    }
}

#[test]
fn test_mark_slot_only_pops_up_when_requested() {
    for pop_up in [false, true] {
        let mut planner = TestPlanner::new();
        let t1 = planner.base_table("t1", &[int("a")]);
        let t2 = planner.base_table("t2", &[int("b")]);
        let mark = planner.catalog.register_mark_tuple(t2.tuple, pop_up).unwrap();
        let eq = Expr::eq(Expr::slot(t1.slots[0], t1.tuple), Expr::slot(t2.slots[0], t2.tuple));
        let id = planner.next_id();
        let mut join = JoinNode::new(
            id,
            t1.node,
            t2.node,
            JoinRelation::new(t2.tuple, JoinOperator::LeftSemi).mark(),
            JoinAlgorithm::hash(vec![]).with_mark_conjuncts(vec![eq]),
        );
        join.init(&mut planner.catalog).unwrap();

        let slots = planner.output_slots(&join);
        assert_eq!(slots.len(), 1 + pop_up as usize);
        // The mark is computed by the join either way
        assert_eq!(join.intermediate_tuples().len(), 3);
        assert_eq!(join.intermediate_tuples()[2], mark);
        // Mark conjuncts keep the probe side alive
        assert_eq!(planner.slots_of(join.intermediate_tuples()[1]).len(), 1);
    }
}

#[test]
fn test_mark_join_without_relation_never_pops_up() {
    let mut planner = TestPlanner::new();
    let t1 = planner.base_table("t1", &[int("a")]);
    let t2 = planner.base_table("t2", &[int("b")]);
    planner.catalog.register_mark_tuple(t2.tuple, true).unwrap();
    let id = planner.next_id();
    let mut join = JoinNode::from_operator(
        id,
        t1.node,
        t2.node,
        JoinOperator::LeftSemi,
        true,
        JoinAlgorithm::nested_loop(),
    );
    join.init(&mut planner.catalog).unwrap();
    assert_eq!(planner.output_slots(&join).len(), 1);
    assert_eq!(join.intermediate_tuples().len(), 2);
}

#[test]
fn test_projection_pushdown_adds_one_slot() {
    let mut planner = TestPlanner::new();
    let t1 = planner.base_table("t1", &[int("a"), ("n", DataType::BigInt, true)]);
    let t2 = planner.base_table("t2", &[int("c")]);
    let (a, n) = (t1.slots[0], t1.slots[1]);
    let t1_tuple = t1.tuple;
    let mut join = planner.join(t1.node, t2.node, JoinOperator::Inner);

    let output = join.output_tuple().unwrap();
    let out = planner.output_slots(&join);
    let passthrough = Expr::slot(out[0], output);
    let computed = Expr::binary(
        BinaryOp::Multiply,
        Expr::slot(out[1], output),
        Expr::slot(out[2], output),
    );
    let mut parent = SubstitutionMap::new();
    parent.put(Expr::slot(a, t1_tuple), passthrough.clone());
    parent.put(Expr::slot(n, t1_tuple), computed);

    let before = out.len();
    let src_before = join.src_to_output_smap().unwrap().len();
    join.set_output_smap(parent, &mut planner.catalog).unwrap();

    let after = planner.output_slots(&join);
    assert_eq!(after.len(), before + 1);
    assert_eq!(join.src_to_output_smap().unwrap().len(), src_before + 1);

    let targets: Vec<&Expr> = join.output_smap().targets().collect();
    assert_eq!(targets[0], &passthrough);
    assert_eq!(targets[1], &Expr::slot(after[before], output));

    let new_slot = planner.catalog.slot(after[before]).unwrap();
    assert_eq!(new_slot.data_type(), DataType::BigInt);
    assert!(new_slot.is_nullable());
    assert!(new_slot.is_materialized());
}

#[test]
fn test_projection_over_other_tuples_passes_through() {
    let mut planner = TestPlanner::new();
    let t1 = planner.base_table("t1", &[int("a")]);
    let t2 = planner.base_table("t2", &[int("b")]);
    let t1_slot = Expr::slot(t1.slots[0], t1.tuple);
    let mut join = planner.join(t1.node, t2.node, JoinOperator::Inner);
    let before = planner.output_slots(&join).len();

    let foreign = Expr::binary(BinaryOp::Add, t1_slot.clone(), Expr::literal(1));
    let mut parent = SubstitutionMap::new();
    parent.put(t1_slot, foreign.clone());
    join.set_output_smap(parent, &mut planner.catalog).unwrap();

    assert_eq!(planner.output_slots(&join).len(), before);
    assert_eq!(join.output_smap().targets().next(), Some(&foreign));
}

#[test]
fn test_outer_joined_child_join_infects_parent() {
    for outer_joined in [false, true] {
        let mut planner = TestPlanner::new();
        let t1 = planner.base_table("t1", &[int("a")]);
        let t2 = planner.base_table("t2", &[int("b")]);
        let t3 = planner.base_table("t3", &[int("c")]);
        let child = planner.join(t1.node, t2.node, JoinOperator::Inner);
        if outer_joined {
            planner
                .catalog
                .register_outer_joined(child.output_tuple().unwrap());
        }
        let parent = planner.join(child.into(), t3.node, JoinOperator::Inner);

        let slots = planner.output_slots(&parent);
        assert_eq!(slots.len(), 3);
        assert_eq!(planner.is_nullable(slots[0]), outer_joined);
        assert_eq!(planner.is_nullable(slots[1]), outer_joined);
        assert!(!planner.is_nullable(slots[2]));
    }
}

#[test]
fn test_nested_join_output_map_reaches_base_slots() {
    let mut planner = TestPlanner::new();
    let t1 = planner.base_table("t1", &[int("a")]);
    let t2 = planner.base_table("t2", &[int("b")]);
    let t3 = planner.base_table("t3", &[int("c")]);
    let base_a = Expr::slot(t1.slots[0], t1.tuple);
    let child = planner.join(t1.node, t2.node, JoinOperator::LeftOuter);
    let parent = planner.join(child.into(), t3.node, JoinOperator::Inner);

    let output = parent.output_tuple().unwrap();
    let target = parent.output_smap().get(&base_a).unwrap();
    assert_eq!(target, &Expr::slot(planner.output_slots(&parent)[0], output));
    assert_eq!(parent.num_instances(), 1);
    // The inner join keeps the child's nullable right column
    assert!(planner.is_nullable(planner.output_slots(&parent)[1]));
}

#[test]
fn test_explain_shows_tree() {
    let mut planner = TestPlanner::new();
    let t1 = planner.base_table("t1", &[int("a")]);
    let view = planner.inline_view("v", &[int("x")]);
    let join = planner.join(t1.node, view.node, JoinOperator::LeftOuter);
    let text = join.explain(&planner.catalog).unwrap();
    assert!(text.contains("NESTED LOOP JOIN"));
    assert!(text.contains("join op: LEFT OUTER JOIN"));
    assert!(text.contains("TupleIsNull("));
    assert!(text.contains("  0:SCAN t1"));
    assert!(text.contains("  1:VIEW v"));
}

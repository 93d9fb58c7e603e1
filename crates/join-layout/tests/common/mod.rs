//! Common test utilities for join layout integration tests
#![allow(dead_code)]

use proven_join_layout::{
    DataType, DescriptorTable, Expr, JoinAlgorithm, JoinNode, JoinOperator, JoinRelation,
    LayoutConfig, PlanNode, PlanNodeId, RelationNode, SlotId, SubstitutionMap, TupleId, TupleKind,
};

/// A column definition: label, type, nullable
pub type Column<'a> = (&'a str, DataType, bool);

/// A planned base table
pub struct Table {
    pub node: PlanNode,
    pub tuple: TupleId,
    pub slots: Vec<SlotId>,
}

/// A planned inline view over one base table
pub struct View {
    pub node: PlanNode,
    pub view: TupleId,
    pub base: TupleId,
    pub view_slots: Vec<SlotId>,
    pub base_slots: Vec<SlotId>,
}

/// Builds catalogs and plan trees the way an upstream planner would
pub struct TestPlanner {
    pub catalog: DescriptorTable,
    next_node: u32,
}

impl TestPlanner {
    pub fn new() -> Self {
        Self {
            catalog: DescriptorTable::new(),
            next_node: 0,
        }
    }

    pub fn next_id(&mut self) -> PlanNodeId {
        let id = PlanNodeId::new(self.next_node);
        self.next_node += 1;
        id
    }

    /// A scanned table with every column materialized and a finalized layout
    pub fn base_table(&mut self, name: &str, columns: &[Column]) -> Table {
        let tuple = self.catalog.create_tuple_descriptor(TupleKind::BaseTable);
        let slots = columns
            .iter()
            .map(|(label, ty, nullable)| {
                self.catalog
                    .add_column(tuple, label, *ty, *nullable)
                    .unwrap()
            })
            .collect();
        self.catalog.compute_stat_and_mem_layout(tuple).unwrap();
        let id = self.next_id();
        Table {
            node: RelationNode::base_table(id, name, tuple).into(),
            tuple,
            slots,
        }
    }

    /// An inline view projecting one column per base column
    pub fn inline_view(&mut self, name: &str, columns: &[Column]) -> View {
        self.inline_view_with(name, columns, |base| base.to_vec())
    }

    /// An inline view whose projections are built from the base columns.
    /// View slots start unmaterialized; the join materializes the ones it reads.
    pub fn inline_view_with(
        &mut self,
        name: &str,
        columns: &[Column],
        project: impl FnOnce(&[Expr]) -> Vec<Expr>,
    ) -> View {
        let base = self.catalog.create_tuple_descriptor(TupleKind::BaseTable);
        let base_slots: Vec<SlotId> = columns
            .iter()
            .map(|(label, ty, nullable)| {
                self.catalog.add_column(base, label, *ty, *nullable).unwrap()
            })
            .collect();
        self.catalog.compute_stat_and_mem_layout(base).unwrap();

        let base_exprs: Vec<Expr> = base_slots.iter().map(|s| Expr::slot(*s, base)).collect();
        let projections = project(&base_exprs);

        let view = self.catalog.create_tuple_descriptor(TupleKind::InlineView);
        let mut smap = SubstitutionMap::new();
        let mut view_slots = Vec::new();
        for expr in projections {
            let ty = expr.data_type(&self.catalog).unwrap();
            let slot = self.catalog.add_slot_descriptor(view, ty).unwrap();
            self.catalog.init_slot_from_expr(slot, &expr).unwrap();
            smap.put(Expr::slot(slot, view), expr);
            view_slots.push(slot);
        }

        let id = self.next_id();
        View {
            node: RelationNode::inline_view(id, name, view, vec![base], smap).into(),
            view,
            base,
            view_slots,
            base_slots,
        }
    }

    /// An inline view of integer constants with no physical tuple
    pub fn constant_view(&mut self, name: &str, values: &[i32]) -> (PlanNode, TupleId) {
        let view = self.catalog.create_tuple_descriptor(TupleKind::InlineView);
        let mut smap = SubstitutionMap::new();
        for value in values {
            let expr = Expr::literal(*value);
            let slot = self.catalog.add_slot_descriptor(view, DataType::Int).unwrap();
            self.catalog.init_slot_from_expr(slot, &expr).unwrap();
            smap.put(Expr::slot(slot, view), expr);
        }
        let id = self.next_id();
        let node = RelationNode::inline_view(id, name, view, vec![], smap).into();
        (node, view)
    }

    /// Join two children and initialize the join. The relation is the last
    /// relation of the right child.
    pub fn join(&mut self, left: PlanNode, right: PlanNode, op: JoinOperator) -> JoinNode {
        self.join_with(left, right, op, JoinAlgorithm::nested_loop(), LayoutConfig::default())
    }

    pub fn join_with(
        &mut self,
        left: PlanNode,
        right: PlanNode,
        op: JoinOperator,
        algorithm: JoinAlgorithm,
        config: LayoutConfig,
    ) -> JoinNode {
        let relation = *right.tbl_ref_ids().last().unwrap();
        let id = self.next_id();
        let mut join = JoinNode::new(id, left, right, JoinRelation::new(relation, op), algorithm)
            .with_config(config);
        join.init(&mut self.catalog).unwrap();
        join
    }

    pub fn output_slots(&self, join: &JoinNode) -> Vec<SlotId> {
        self.slots_of(join.output_tuple().unwrap())
    }

    pub fn slots_of(&self, tuple: TupleId) -> Vec<SlotId> {
        self.catalog.tuple(tuple).unwrap().slot_ids().to_vec()
    }

    pub fn is_nullable(&self, slot: SlotId) -> bool {
        self.catalog.slot(slot).unwrap().is_nullable()
    }
}

pub fn int(label: &str) -> Column<'_> {
    (label, DataType::Int, false)
}

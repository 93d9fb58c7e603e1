//! The join plan node
//!
//! A join lays out three row shapes. Its children produce the source rows.
//! The intermediate tuples hold the rows the execution step reads after the
//! probe, and the output tuple is what parents see. `init` builds the output
//! tuple first (see `output_tuple`), then the intermediate tuples
//! (`intermediate_tuple`); parents may later push projections into the node
//! (`projection`).

use super::join_op::JoinOperator;
use super::node::PlanNode;
use super::strategy::JoinAlgorithm;
use crate::catalog::{DescriptorTable, PlanNodeId, TupleId};
use crate::config::LayoutConfig;
use crate::error::{Result, check_state};
use crate::smap::SubstitutionMap;
use crate::types::{Expr, NullSide};
use std::ops::Range;

/// The relation on the right of a join, with the context of its ON clause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinRelation {
    /// Logical tuple of the relation. Mark tuples are registered under it.
    pub tuple: TupleId,
    pub join_op: JoinOperator,
    pub is_mark: bool,
}

impl JoinRelation {
    pub fn new(tuple: TupleId, join_op: JoinOperator) -> Self {
        Self {
            tuple,
            join_op,
            is_mark: false,
        }
    }

    pub fn mark(mut self) -> Self {
        self.is_mark = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct JoinNode {
    pub(super) id: PlanNodeId,
    pub(super) join_op: JoinOperator,
    pub(super) is_mark: bool,
    /// None when built by a planner without relation references
    pub(super) relation: Option<TupleId>,
    pub(super) algorithm: JoinAlgorithm,
    pub(super) config: LayoutConfig,
    pub(super) left: Box<PlanNode>,
    pub(super) right: Box<PlanNode>,
    pub(super) tbl_ref_ids: Vec<TupleId>,
    pub(super) tuple_ids: Vec<TupleId>,
    pub(super) nullable_tuple_ids: Vec<TupleId>,
    pub(super) conjuncts: Vec<Expr>,
    pub(super) output_smap: SubstitutionMap,
    pub(super) output_tuple: Option<TupleId>,
    /// Source expression -> output slot, aligned with the output tuple's slots
    pub(super) src_to_output: Option<SubstitutionMap>,
    /// Positions of each copied side's slots in the output tuple
    pub(super) side_ranges: Vec<(NullSide, Range<usize>)>,
    pub(super) intermediate_tuples: Vec<TupleId>,
}

impl JoinNode {
    pub fn new(
        id: PlanNodeId,
        left: PlanNode,
        right: PlanNode,
        relation: JoinRelation,
        algorithm: JoinAlgorithm,
    ) -> Self {
        Self::build(
            id,
            left,
            right,
            relation.join_op,
            relation.is_mark,
            Some(relation.tuple),
            algorithm,
        )
    }

    /// Build a join without a relation reference. Such a join never exposes
    /// a mark slot to its parent.
    pub fn from_operator(
        id: PlanNodeId,
        left: PlanNode,
        right: PlanNode,
        join_op: JoinOperator,
        is_mark: bool,
        algorithm: JoinAlgorithm,
    ) -> Self {
        Self::build(id, left, right, join_op, is_mark, None, algorithm)
    }

    fn build(
        id: PlanNodeId,
        left: PlanNode,
        right: PlanNode,
        join_op: JoinOperator,
        is_mark: bool,
        relation: Option<TupleId>,
        algorithm: JoinAlgorithm,
    ) -> Self {
        let mut tbl_ref_ids = left.tbl_ref_ids();
        tbl_ref_ids.extend(right.tbl_ref_ids());

        let tuple_ids = if join_op.is_left_semi_or_anti() {
            left.tuple_ids()
        } else if join_op.is_right_semi_or_anti() {
            right.tuple_ids()
        } else {
            let mut ids = left.tuple_ids();
            ids.extend(right.tuple_ids());
            ids
        };

        let mut nullable_tuple_ids = left.nullable_tuple_ids();
        nullable_tuple_ids.extend(right.nullable_tuple_ids());
        let rules = join_op.output_rules();
        if rules.left_nullable {
            nullable_tuple_ids.extend(left.output_tuple_ids());
        }
        if rules.right_nullable {
            nullable_tuple_ids.extend(right.output_tuple_ids());
        }

        Self {
            id,
            join_op,
            is_mark,
            relation,
            algorithm,
            config: LayoutConfig::default(),
            left: Box::new(left),
            right: Box::new(right),
            tbl_ref_ids,
            tuple_ids,
            nullable_tuple_ids,
            conjuncts: Vec::new(),
            output_smap: SubstitutionMap::new(),
            output_tuple: None,
            src_to_output: None,
            side_ranges: Vec::new(),
            intermediate_tuples: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: LayoutConfig) -> Self {
        self.config = config;
        self
    }

    /// Lay out the output and intermediate tuples and build the maps that
    /// rewrite expressions between them.
    pub fn init(&mut self, catalog: &mut DescriptorTable) -> Result<()> {
        check_state(self.output_tuple.is_none(), || {
            format!("join node {} is already initialized", self.id)
        })?;
        self.output_smap =
            SubstitutionMap::combine(self.left.output_smap(), self.right.output_smap());
        self.compute_output_tuple(catalog)?;
        self.compute_intermediate_tuple(catalog)?;
        tracing::debug!(
            "initialized {} {} ({}): output tuple {:?}, intermediate tuples {:?}",
            self.algorithm.node_name(),
            self.id,
            self.join_op,
            self.output_tuple,
            self.intermediate_tuples
        );
        Ok(())
    }

    pub fn id(&self) -> PlanNodeId {
        self.id
    }

    pub fn join_op(&self) -> JoinOperator {
        self.join_op
    }

    pub fn is_mark_join(&self) -> bool {
        self.is_mark
    }

    pub fn relation(&self) -> Option<TupleId> {
        self.relation
    }

    pub fn algorithm(&self) -> &JoinAlgorithm {
        &self.algorithm
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn left(&self) -> &PlanNode {
        &self.left
    }

    pub fn right(&self) -> &PlanNode {
        &self.right
    }

    pub(super) fn child(&self, side: NullSide) -> &PlanNode {
        match side {
            NullSide::Left => &self.left,
            NullSide::Right => &self.right,
        }
    }

    /// Once the output tuple exists it is the only tuple a parent sees.
    pub fn tuple_ids(&self) -> Vec<TupleId> {
        match self.output_tuple {
            Some(output) => vec![output],
            None => self.tuple_ids.clone(),
        }
    }

    pub fn tbl_ref_ids(&self) -> &[TupleId] {
        &self.tbl_ref_ids
    }

    pub fn output_tuple_ids(&self) -> Vec<TupleId> {
        if let Some(output) = self.output_tuple {
            return vec![output];
        }
        if self.join_op.is_left_semi_or_anti() {
            self.left.output_tuple_ids()
        } else if self.join_op.is_right_semi_or_anti() {
            self.right.output_tuple_ids()
        } else {
            self.tuple_ids.clone()
        }
    }

    pub fn output_tbl_ref_ids(&self) -> Vec<TupleId> {
        if let Some(output) = self.output_tuple {
            return vec![output];
        }
        if self.join_op.is_left_semi_or_anti() {
            self.left.output_tbl_ref_ids()
        } else if self.join_op.is_right_semi_or_anti() {
            self.right.output_tbl_ref_ids()
        } else {
            self.tbl_ref_ids.clone()
        }
    }

    pub fn nullable_tuple_ids(&self) -> &[TupleId] {
        &self.nullable_tuple_ids
    }

    /// Parallelism hint: the wider of the two children
    pub fn num_instances(&self) -> usize {
        self.left.num_instances().max(self.right.num_instances())
    }

    pub fn output_smap(&self) -> &SubstitutionMap {
        &self.output_smap
    }

    pub fn output_tuple(&self) -> Option<TupleId> {
        self.output_tuple
    }

    pub fn intermediate_tuples(&self) -> &[TupleId] {
        &self.intermediate_tuples
    }

    /// Use intermediate tuples laid out by another planner
    pub fn set_intermediate_tuples(&mut self, tuples: Vec<TupleId>) {
        self.intermediate_tuples = tuples;
    }

    pub fn src_to_output_smap(&self) -> Option<&SubstitutionMap> {
        self.src_to_output.as_ref()
    }

    /// Predicates evaluated on the joined row
    pub fn conjuncts(&self) -> &[Expr] {
        &self.conjuncts
    }

    pub fn add_conjuncts(&mut self, conjuncts: impl IntoIterator<Item = Expr>) {
        self.conjuncts.extend(conjuncts);
    }

    pub fn explain(&self, catalog: &DescriptorTable) -> Result<String> {
        let mut out = String::new();
        self.explain_into(catalog, 0, &mut out)?;
        Ok(out)
    }

    pub(crate) fn explain_into(
        &self,
        catalog: &DescriptorTable,
        depth: usize,
        out: &mut String,
    ) -> Result<()> {
        let indent = "  ".repeat(depth);
        out.push_str(&format!("{}{}:{}\n", indent, self.id, self.algorithm.node_name()));
        out.push_str(&format!("{}|  join op: {}\n", indent, self.join_op));
        let join_conjuncts = self.algorithm.join_conjuncts();
        if !join_conjuncts.is_empty() {
            out.push_str(&format!(
                "{}|  join conjuncts: {}\n",
                indent,
                join_list(join_conjuncts.iter().map(|c| c.to_string()))
            ));
        }
        if !self.conjuncts.is_empty() {
            out.push_str(&format!(
                "{}|  predicates: {}\n",
                indent,
                join_list(self.conjuncts.iter().map(|c| c.to_string()))
            ));
        }
        out.push_str(&format!("{}|  mark join: {}\n", indent, self.is_mark));
        if let Some(output) = self.output_tuple {
            let tuple = catalog.tuple(output)?;
            out.push_str(&format!(
                "{}|  output tuple id: {} ({} slots)\n",
                indent,
                output,
                tuple.slot_ids().len()
            ));
        }
        if !self.intermediate_tuples.is_empty() {
            out.push_str(&format!(
                "{}|  intermediate tuple ids: {}\n",
                indent,
                join_list(self.intermediate_tuples.iter().map(|t| t.to_string()))
            ));
        }
        if let Some(src_to_output) = &self.src_to_output {
            out.push_str(&format!("{}|  output exprs: {}\n", indent, src_to_output));
        }
        self.left.explain_into(catalog, depth + 1, out)?;
        self.right.explain_into(catalog, depth + 1, out)
    }
}

fn join_list(items: impl Iterator<Item = String>) -> String {
    items.collect::<Vec<_>>().join(", ")
}

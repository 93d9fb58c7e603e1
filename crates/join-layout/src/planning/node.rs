//! Plan nodes seen by the join builders
//!
//! A join only needs a handful of facts from its children: the tuples they
//! produce, the relations they cover and the output map through which a
//! parent's expressions reach their slots. `RelationNode` stands in for any
//! already planned leaf (a table scan or a planned inline view).

use super::join_node::JoinNode;
use crate::catalog::{DescriptorTable, PlanNodeId, TupleId};
use crate::error::Result;
use crate::smap::SubstitutionMap;

#[derive(Debug, Clone)]
pub struct RelationNode {
    id: PlanNodeId,
    name: String,
    /// The relation's logical tuple
    relation: TupleId,
    /// Tuples the node actually produces
    tuple_ids: Vec<TupleId>,
    output_smap: SubstitutionMap,
    nullable_tuple_ids: Vec<TupleId>,
    num_instances: usize,
}

impl RelationNode {
    /// A scan whose logical and physical tuple are the same
    pub fn base_table(id: PlanNodeId, name: impl Into<String>, tuple: TupleId) -> Self {
        Self {
            id,
            name: name.into(),
            relation: tuple,
            tuple_ids: vec![tuple],
            output_smap: SubstitutionMap::new(),
            nullable_tuple_ids: Vec::new(),
            num_instances: 1,
        }
    }

    /// A planned subquery. `output_smap` maps the view's logical slots to
    /// expressions over the physical `tuple_ids`.
    pub fn inline_view(
        id: PlanNodeId,
        name: impl Into<String>,
        view: TupleId,
        tuple_ids: Vec<TupleId>,
        output_smap: SubstitutionMap,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            relation: view,
            tuple_ids,
            output_smap,
            nullable_tuple_ids: Vec::new(),
            num_instances: 1,
        }
    }

    pub fn with_num_instances(mut self, num_instances: usize) -> Self {
        self.num_instances = num_instances;
        self
    }

    /// Tuples already on the null side of an outer join below this node
    pub fn with_nullable_tuple_ids(mut self, tuple_ids: Vec<TupleId>) -> Self {
        self.nullable_tuple_ids = tuple_ids;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn relation(&self) -> TupleId {
        self.relation
    }
}

#[derive(Debug, Clone)]
pub enum PlanNode {
    Relation(RelationNode),
    Join(JoinNode),
}

impl PlanNode {
    pub fn id(&self) -> PlanNodeId {
        match self {
            PlanNode::Relation(node) => node.id,
            PlanNode::Join(node) => node.id(),
        }
    }

    pub fn is_join(&self) -> bool {
        matches!(self, PlanNode::Join(_))
    }

    pub fn as_join(&self) -> Option<&JoinNode> {
        match self {
            PlanNode::Join(node) => Some(node),
            PlanNode::Relation(_) => None,
        }
    }

    /// Tuples materialized by this node
    pub fn tuple_ids(&self) -> Vec<TupleId> {
        match self {
            PlanNode::Relation(node) => node.tuple_ids.clone(),
            PlanNode::Join(node) => node.tuple_ids(),
        }
    }

    /// Logical tuples of the relations this node covers
    pub fn tbl_ref_ids(&self) -> Vec<TupleId> {
        match self {
            PlanNode::Relation(node) => vec![node.relation],
            PlanNode::Join(node) => node.tbl_ref_ids().to_vec(),
        }
    }

    pub fn output_tuple_ids(&self) -> Vec<TupleId> {
        match self {
            PlanNode::Relation(node) => node.tuple_ids.clone(),
            PlanNode::Join(node) => node.output_tuple_ids(),
        }
    }

    pub fn output_tbl_ref_ids(&self) -> Vec<TupleId> {
        match self {
            PlanNode::Relation(node) => vec![node.relation],
            PlanNode::Join(node) => node.output_tbl_ref_ids(),
        }
    }

    pub fn nullable_tuple_ids(&self) -> Vec<TupleId> {
        match self {
            PlanNode::Relation(node) => node.nullable_tuple_ids.clone(),
            PlanNode::Join(node) => node.nullable_tuple_ids().to_vec(),
        }
    }

    /// Map from the expressions a parent may use to the slots that carry them
    pub fn output_smap(&self) -> &SubstitutionMap {
        match self {
            PlanNode::Relation(node) => &node.output_smap,
            PlanNode::Join(node) => node.output_smap(),
        }
    }

    pub fn num_instances(&self) -> usize {
        match self {
            PlanNode::Relation(node) => node.num_instances,
            PlanNode::Join(node) => node.num_instances(),
        }
    }

    /// Render the subtree rooted here, one node per line
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
        match self {
            PlanNode::Relation(node) => {
                let indent = "  ".repeat(depth);
                let kind = if catalog.is_inline_view(node.relation) {
                    "VIEW"
                } else {
                    "SCAN"
                };
                out.push_str(&format!(
                    "{}{}:{} {} (tuple ids: {:?})\n",
                    indent,
                    node.id,
                    kind,
                    node.name,
                    node.tuple_ids.iter().map(|t| t.as_u32()).collect::<Vec<_>>()
                ));
                Ok(())
            }
            PlanNode::Join(node) => node.explain_into(catalog, depth, out),
        }
    }
}

impl From<RelationNode> for PlanNode {
    fn from(node: RelationNode) -> Self {
        PlanNode::Relation(node)
    }
}

impl From<JoinNode> for PlanNode {
    fn from(node: JoinNode) -> Self {
        PlanNode::Join(node)
    }
}

//! Join planning
//!
//! This module contains:
//! - `join_op` - join operators and their nullability rules
//! - `node` - the plan node variants a join is built from
//! - `strategy` - hooks that depend on the physical join algorithm
//! - `join_node` - the join node and its public surface
//!
//! The join node's three build phases live in their own modules:
//! `output_tuple`, `intermediate_tuple` and `projection`.

pub mod join_node;
pub mod join_op;
pub mod node;
pub mod strategy;

mod intermediate_tuple;
mod output_tuple;
mod projection;

pub use join_node::{JoinNode, JoinRelation};
pub use join_op::{JoinOperator, OutputRules};
pub use node::{PlanNode, RelationNode};
pub use strategy::JoinAlgorithm;

//! Join tuple layout and projection rewriting for a SQL query planner
//!
//! Given two planned children, a join node:
//! - Lays out its logical output tuple and decides which columns may be NULL
//! - Guards the columns of an outer-joined inline view so a missing row reads
//!   as NULL as a whole
//! - Lays out the intermediate tuples its execution step reads and rewrites
//!   output expressions and predicates onto them
//! - Accepts projections pushed down by its parent
//!
//! All descriptors of one query live in a [`DescriptorTable`] owned by the
//! planning pass; nothing here is shared across queries.

pub mod catalog;
pub mod config;
mod error;
pub mod planning;
pub mod smap;
pub mod types;

pub use catalog::{DescriptorTable, PlanNodeId, SlotId, TupleId, TupleKind};
pub use config::LayoutConfig;
pub use error::{Error, Result};
pub use planning::{
    JoinAlgorithm, JoinNode, JoinOperator, JoinRelation, PlanNode, RelationNode,
};
pub use smap::{Substitution, SubstitutionMap};
pub use types::{DataType, Expr, JoinedRow, NullSide, Value};

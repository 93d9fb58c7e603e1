//! The data model shared by the catalog and the planner: data types, values,
//! expressions and row-level evaluation.

pub mod data_type;
pub mod evaluator;
pub mod expression;
pub mod value;

pub use data_type::DataType;
pub use evaluator::JoinedRow;
pub use expression::{BinaryOp, Expr, NullSide, SlotRef, TupleIsNull};
pub use value::Value;

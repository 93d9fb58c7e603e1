//! Descriptor catalog: tuple and slot descriptors, their ids, and the
//! per-query table that owns them.

pub mod descriptor;
pub mod ids;
pub mod table;

pub use descriptor::{
    MemLayout, NullIndicator, SlotDescriptor, SlotLayout, TupleDescriptor, TupleKind,
};
pub use ids::{PlanNodeId, SlotId, TupleId};
pub use table::DescriptorTable;

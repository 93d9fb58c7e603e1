//! Tuple and slot descriptors
//!
//! A tuple descriptor is an ordered, append-only list of slots that share a
//! row identity. Its memory layout is computed once every slot's
//! `materialized` and `nullable` flags are settled; from then on the tuple is
//! finalized and its flags are frozen until the owner explicitly reopens it.

use super::ids::{SlotId, TupleId};
use crate::types::{DataType, Expr};
use serde::{Deserialize, Serialize};

/// What a tuple describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TupleKind {
    /// Columns of a base table scan
    BaseTable,
    /// Logical columns of an inline view (a planned subquery in FROM)
    InlineView,
    /// Logical output row of a join
    JoinOutput,
    /// Physical row a join feeds into its execution step
    JoinIntermediate,
    /// The boolean result column of a mark join
    Mark,
    /// Row produced by any other operator (aggregation, projection, ...)
    Derived,
}

/// One column within a tuple
#[derive(Debug, Clone, PartialEq)]
pub struct SlotDescriptor {
    id: SlotId,
    parent: TupleId,
    label: Option<String>,
    data_type: DataType,
    nullable: bool,
    materialized: bool,
    source_exprs: Vec<Expr>,
}

impl SlotDescriptor {
    pub(crate) fn new(id: SlotId, parent: TupleId, data_type: DataType) -> Self {
        Self {
            id,
            parent,
            label: None,
            data_type,
            nullable: true,
            materialized: false,
            source_exprs: Vec::new(),
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    /// The tuple this slot belongs to, for its whole lifetime
    pub fn parent(&self) -> TupleId {
        self.parent
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_materialized(&self) -> bool {
        self.materialized
    }

    /// Expressions this slot's value is derived from
    pub fn source_exprs(&self) -> &[Expr] {
        &self.source_exprs
    }

    pub(crate) fn set_label(&mut self, label: Option<String>) {
        self.label = label;
    }

    pub(crate) fn set_data_type(&mut self, data_type: DataType) {
        self.data_type = data_type;
    }

    pub(crate) fn set_nullable(&mut self, nullable: bool) {
        self.nullable = nullable;
    }

    pub(crate) fn set_materialized(&mut self, materialized: bool) {
        self.materialized = materialized;
    }

    pub(crate) fn set_source_exprs(&mut self, exprs: Vec<Expr>) {
        self.source_exprs = exprs;
    }
}

/// Position of a nullable slot's null flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NullIndicator {
    pub byte: usize,
    pub bit: u8,
}

/// Placement of one materialized slot inside the tuple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLayout {
    pub slot: SlotId,
    pub byte_offset: usize,
    pub byte_size: usize,
    /// Position of the slot in the tuple struct, smallest fields first
    pub slot_idx: usize,
    /// None for non-nullable slots
    pub null_indicator: Option<NullIndicator>,
}

/// Memory layout of a finalized tuple
#[derive(Debug, Clone, PartialEq)]
pub struct MemLayout {
    pub byte_size: usize,
    pub num_null_bytes: usize,
    pub slots: Vec<SlotLayout>,
    /// Average serialized row width, when statistics were computed
    pub avg_serialized_size: Option<f64>,
}

impl MemLayout {
    /// Lay out the materialized slots of a tuple.
    ///
    /// Null indicator bytes come first. Slots follow in ascending size
    /// order, each size class aligned to `min(size, 8)`.
    pub(crate) fn compute(slots: &[&SlotDescriptor]) -> MemLayout {
        let materialized: Vec<&SlotDescriptor> =
            slots.iter().copied().filter(|s| s.is_materialized()).collect();
        let num_nullable = materialized.iter().filter(|s| s.is_nullable()).count();
        let num_null_bytes = num_nullable.div_ceil(8);

        let mut by_size = materialized.clone();
        // Stable sort keeps declaration order within a size class
        by_size.sort_by_key(|s| s.data_type().slot_size());

        let mut offset = num_null_bytes;
        let mut null_byte = 0;
        let mut null_bit = 0u8;
        let mut current_size = 0;
        let mut layouts = Vec::with_capacity(by_size.len());

        for (slot_idx, slot) in by_size.iter().enumerate() {
            let size = slot.data_type().slot_size();
            if size != current_size {
                current_size = size;
                if size > 1 {
                    let align = size.min(8);
                    offset = offset.div_ceil(align) * align;
                }
            }

            let null_indicator = if slot.is_nullable() {
                let indicator = NullIndicator {
                    byte: null_byte,
                    bit: null_bit,
                };
                null_bit = (null_bit + 1) % 8;
                if null_bit == 0 {
                    null_byte += 1;
                }
                Some(indicator)
            } else {
                None
            };

            layouts.push(SlotLayout {
                slot: slot.id(),
                byte_offset: offset,
                byte_size: size,
                slot_idx,
                null_indicator,
            });
            offset += size;
        }

        MemLayout {
            byte_size: offset,
            num_null_bytes,
            slots: layouts,
            avg_serialized_size: None,
        }
    }

    /// Layout of a specific slot, if it was materialized
    pub fn slot(&self, slot: SlotId) -> Option<&SlotLayout> {
        self.slots.iter().find(|layout| layout.slot == slot)
    }
}

/// Build state of a tuple's layout
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutState {
    Building,
    Finalized(MemLayout),
}

/// An ordered set of slots sharing one row identity
#[derive(Debug, Clone, PartialEq)]
pub struct TupleDescriptor {
    id: TupleId,
    kind: TupleKind,
    slots: Vec<SlotId>,
    layout: LayoutState,
}

impl TupleDescriptor {
    pub(crate) fn new(id: TupleId, kind: TupleKind) -> Self {
        Self {
            id,
            kind,
            slots: Vec::new(),
            layout: LayoutState::Building,
        }
    }

    pub fn id(&self) -> TupleId {
        self.id
    }

    pub fn kind(&self) -> TupleKind {
        self.kind
    }

    /// Slots in declaration order
    pub fn slot_ids(&self) -> &[SlotId] {
        &self.slots
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.layout, LayoutState::Finalized(_))
    }

    pub fn layout(&self) -> Option<&MemLayout> {
        match &self.layout {
            LayoutState::Finalized(layout) => Some(layout),
            LayoutState::Building => None,
        }
    }

    pub(crate) fn push_slot(&mut self, slot: SlotId) {
        self.slots.push(slot);
    }

    pub(crate) fn set_layout(&mut self, state: LayoutState) {
        self.layout = state;
    }
}

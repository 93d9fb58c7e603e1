//! The per-query descriptor table
//!
//! Owns every tuple and slot descriptor created while planning one query.
//! Descriptors live in arenas indexed by their ids and are never removed.
//! Besides allocation and layout, the table records the facts the join
//! planner queries about tuples: which tuples are outer-joined and which
//! relations carry a mark tuple that must be visible above the join.

use super::descriptor::{LayoutState, MemLayout, SlotDescriptor, TupleDescriptor, TupleKind};
use super::ids::{SlotId, TupleId};
use crate::error::{Error, Result};
use crate::types::{DataType, Expr};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy)]
struct MarkTuple {
    tuple: TupleId,
    pop_up: bool,
}

#[derive(Debug, Default)]
pub struct DescriptorTable {
    tuples: Vec<TupleDescriptor>,
    slots: Vec<SlotDescriptor>,
    outer_joined: HashSet<TupleId>,
    mark_tuples: HashMap<TupleId, MarkTuple>,
}

impl DescriptorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new, empty tuple descriptor
    pub fn create_tuple_descriptor(&mut self, kind: TupleKind) -> TupleId {
        let id = TupleId::new(self.tuples.len() as u32);
        self.tuples.push(TupleDescriptor::new(id, kind));
        id
    }

    /// Append a new slot to `tuple`. The slot starts nullable and unmaterialized.
    pub fn add_slot_descriptor(&mut self, tuple: TupleId, data_type: DataType) -> Result<SlotId> {
        self.building_tuple_mut(tuple)?;
        let id = SlotId::new(self.slots.len() as u32);
        self.slots.push(SlotDescriptor::new(id, tuple, data_type));
        self.tuple_mut(tuple)?.push_slot(id);
        Ok(id)
    }

    /// Append a materialized, labelled column to `tuple`
    pub fn add_column(
        &mut self,
        tuple: TupleId,
        label: &str,
        data_type: DataType,
        nullable: bool,
    ) -> Result<SlotId> {
        let id = self.add_slot_descriptor(tuple, data_type)?;
        let slot = self.slot_mut(id)?;
        slot.set_label(Some(label.to_string()));
        slot.set_nullable(nullable);
        slot.set_materialized(true);
        Ok(id)
    }

    /// Append a copy of `source` to `target`.
    ///
    /// The copy keeps the source's type, label and flags, and records a
    /// reference to the source slot as its source expression.
    pub fn copy_slot_descriptor(&mut self, target: TupleId, source: SlotId) -> Result<SlotId> {
        let src = self.slot(source)?.clone();
        let id = self.add_slot_descriptor(target, src.data_type())?;
        let slot = self.slot_mut(id)?;
        slot.set_label(src.label().map(str::to_string));
        slot.set_nullable(src.is_nullable());
        slot.set_materialized(src.is_materialized());
        slot.set_source_exprs(vec![Expr::slot(source, src.parent())]);
        tracing::trace!(
            "copied slot {} of tuple {} to slot {} of tuple {}",
            source,
            src.parent(),
            id,
            target
        );
        Ok(id)
    }

    pub fn tuple(&self, id: TupleId) -> Result<&TupleDescriptor> {
        self.tuples.get(id.index()).ok_or(Error::TupleNotFound(id))
    }

    pub fn slot(&self, id: SlotId) -> Result<&SlotDescriptor> {
        self.slots.get(id.index()).ok_or(Error::SlotNotFound(id))
    }

    /// Look up several tuples at once, in the given order
    pub fn get_tuple_descs(&self, ids: &[TupleId]) -> Result<Vec<&TupleDescriptor>> {
        ids.iter().map(|id| self.tuple(*id)).collect()
    }

    /// Materialized slots of a tuple, in declaration order
    pub fn materialized_slots(&self, tuple: TupleId) -> Result<Vec<SlotId>> {
        let mut slots = Vec::new();
        for id in self.tuple(tuple)?.slot_ids() {
            if self.slot(*id)?.is_materialized() {
                slots.push(*id);
            }
        }
        Ok(slots)
    }

    pub fn set_nullable(&mut self, slot: SlotId, nullable: bool) -> Result<()> {
        self.slot_mut(slot)?.set_nullable(nullable);
        Ok(())
    }

    pub fn set_materialized(&mut self, slot: SlotId, materialized: bool) -> Result<()> {
        self.slot_mut(slot)?.set_materialized(materialized);
        Ok(())
    }

    /// Take type, nullability and source from an expression projected into `slot`
    pub fn init_slot_from_expr(&mut self, slot: SlotId, expr: &Expr) -> Result<()> {
        let data_type = expr.data_type(self)?;
        let nullable = expr.is_nullable(self)?;
        let desc = self.slot_mut(slot)?;
        desc.set_data_type(data_type);
        desc.set_nullable(nullable);
        desc.set_source_exprs(vec![expr.clone()]);
        Ok(())
    }

    /// Materialize the slots `slot` is derived from, transitively.
    ///
    /// Stops at slots that are already materialized.
    pub fn materialize_src_expr(&mut self, slot: SlotId) -> Result<()> {
        let mut pending: Vec<SlotId> = self
            .slot(slot)?
            .source_exprs()
            .iter()
            .filter_map(Expr::as_slot_ref)
            .map(|slot_ref| slot_ref.slot)
            .collect();
        while let Some(next) = pending.pop() {
            let desc = self.slot(next)?;
            if desc.is_materialized() {
                continue;
            }
            pending.extend(
                desc.source_exprs()
                    .iter()
                    .filter_map(Expr::as_slot_ref)
                    .map(|slot_ref| slot_ref.slot),
            );
            self.set_materialized(next, true)?;
        }
        Ok(())
    }

    /// Finalize the memory layout of a tuple, freezing its slot flags
    pub fn compute_mem_layout(&mut self, tuple: TupleId) -> Result<()> {
        let layout = self.layout_for(tuple)?;
        tracing::trace!("tuple {} laid out in {} bytes", tuple, layout.byte_size);
        self.tuple_mut(tuple)?.set_layout(LayoutState::Finalized(layout));
        Ok(())
    }

    /// Finalize the layout and record the average serialized row size
    pub fn compute_stat_and_mem_layout(&mut self, tuple: TupleId) -> Result<()> {
        let mut layout = self.layout_for(tuple)?;
        let mut avg_size = 0.0;
        for id in self.tuple(tuple)?.slot_ids() {
            let slot = self.slot(*id)?;
            if slot.is_materialized() {
                avg_size += slot.data_type().avg_serialized_size();
            }
        }
        layout.avg_serialized_size = Some(avg_size);
        self.tuple_mut(tuple)?.set_layout(LayoutState::Finalized(layout));
        Ok(())
    }

    /// Return a finalized tuple to the building state so its flags can be
    /// re-derived. The caller must finalize it again.
    pub fn reopen_layout(&mut self, tuple: TupleId) -> Result<()> {
        self.tuple_mut(tuple)?.set_layout(LayoutState::Building);
        Ok(())
    }

    pub fn is_inline_view(&self, tuple: TupleId) -> bool {
        self.tuple(tuple)
            .map(|t| t.kind() == TupleKind::InlineView)
            .unwrap_or(false)
    }

    /// Whether `tuple` sits on the null side of an enclosing outer join
    pub fn is_outer_joined(&self, tuple: TupleId) -> bool {
        self.outer_joined.contains(&tuple)
    }

    pub fn register_outer_joined(&mut self, tuple: TupleId) {
        self.outer_joined.insert(tuple);
    }

    /// Create the mark tuple of a mark-join relation.
    ///
    /// The tuple holds one nullable boolean slot and is finalized right away.
    /// `pop_up` records whether operators above the join read the mark value.
    pub fn register_mark_tuple(&mut self, relation: TupleId, pop_up: bool) -> Result<TupleId> {
        let tuple = self.create_tuple_descriptor(TupleKind::Mark);
        let slot = self.add_slot_descriptor(tuple, DataType::Boolean)?;
        let desc = self.slot_mut(slot)?;
        desc.set_label(Some("mark".into()));
        desc.set_materialized(true);
        self.compute_mem_layout(tuple)?;
        self.mark_tuples
            .insert(relation, MarkTuple { tuple, pop_up });
        Ok(tuple)
    }

    pub fn get_mark_tuple(&self, relation: TupleId) -> Option<TupleId> {
        self.mark_tuples.get(&relation).map(|mark| mark.tuple)
    }

    pub fn need_pop_up_mark_tuple(&self, relation: TupleId) -> bool {
        self.mark_tuples
            .get(&relation)
            .map(|mark| mark.pop_up)
            .unwrap_or(false)
    }

    pub fn num_tuples(&self) -> usize {
        self.tuples.len()
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    fn layout_for(&self, tuple: TupleId) -> Result<MemLayout> {
        let slots = self
            .tuple(tuple)?
            .slot_ids()
            .iter()
            .map(|id| self.slot(*id))
            .collect::<Result<Vec<_>>>()?;
        Ok(MemLayout::compute(&slots))
    }

    fn tuple_mut(&mut self, id: TupleId) -> Result<&mut TupleDescriptor> {
        self.tuples.get_mut(id.index()).ok_or(Error::TupleNotFound(id))
    }

    fn building_tuple_mut(&mut self, id: TupleId) -> Result<&mut TupleDescriptor> {
        let tuple = self.tuple_mut(id)?;
        if tuple.is_finalized() {
            return Err(Error::LayoutFinalized(id));
        }
        Ok(tuple)
    }

    /// Mutable access to a slot whose tuple is still building
    fn slot_mut(&mut self, id: SlotId) -> Result<&mut SlotDescriptor> {
        let parent = self.slot(id)?.parent();
        self.building_tuple_mut(parent)?;
        self.slots.get_mut(id.index()).ok_or(Error::SlotNotFound(id))
    }
}

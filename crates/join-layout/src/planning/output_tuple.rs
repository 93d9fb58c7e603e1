//! Output tuple construction
//!
//! Copies the reachable slots of the sides a join returns into a fresh
//! output tuple, derives the source -> output map the intermediate builder
//! rewrites later, and guards columns of an outer-joined inline view so its
//! whole row reads as NULL when the join finds no match.

use super::join_node::JoinNode;
use super::node::PlanNode;
use crate::catalog::{DescriptorTable, SlotId, TupleId, TupleKind};
use crate::error::{Error, Result, check_state};
use crate::smap::SubstitutionMap;
use crate::types::{Expr, NullSide};
use std::ops::Range;

impl JoinNode {
    pub(super) fn compute_output_tuple(&mut self, catalog: &mut DescriptorTable) -> Result<()> {
        let output = catalog.create_tuple_descriptor(TupleKind::JoinOutput);
        let rules = self.join_op.output_rules();

        // Positions of each side's entries in the copy map
        let mut copy_map = SubstitutionMap::new();
        let mut side_ranges: Vec<(NullSide, Range<usize>)> = Vec::new();
        for side in [NullSide::Left, NullSide::Right] {
            if !rules.copies(side) {
                continue;
            }
            let start = copy_map.len();
            copy_child_slots(
                catalog,
                self.child(side),
                output,
                rules.forces_nullable(side),
                &mut copy_map,
            )?;
            side_ranges.push((side, start..copy_map.len()));
        }

        if self.is_mark
            && let Some(relation) = self.relation
            && catalog.need_pop_up_mark_tuple(relation)
        {
            let mark = catalog.get_mark_tuple(relation).ok_or_else(|| {
                Error::Internal(format!("relation {} has no mark tuple", relation))
            })?;
            let mark_slot = *catalog.tuple(mark)?.slot_ids().first().ok_or_else(|| {
                Error::Internal(format!("mark tuple {} has no slot", mark))
            })?;
            let copy = catalog.copy_slot_descriptor(output, mark_slot)?;
            copy_map.put(Expr::slot(mark_slot, mark), Expr::slot(copy, output));
        }

        let mut src_to_output = SubstitutionMap::resolve_sources(&copy_map, &self.output_smap);
        for (index, entry) in src_to_output.iter().enumerate() {
            let target = src_to_output.target_slot(index)?;
            match entry.source.as_slot_ref() {
                Some(source) => {
                    let materialized = catalog.slot(source.slot)?.is_materialized();
                    catalog.set_materialized(target.slot, materialized)?;
                }
                None => {
                    catalog.set_materialized(target.slot, true)?;
                    catalog.materialize_src_expr(target.slot)?;
                }
            }
        }
        catalog.compute_stat_and_mem_layout(output)?;

        check_state(copy_map.len() == src_to_output.len(), || {
            format!(
                "copy map has {} entries but source map has {}",
                copy_map.len(),
                src_to_output.len()
            )
        })?;

        if self.config.wrap_null_side_inline_views {
            for (side, range) in &side_ranges {
                if !rules.forces_nullable(*side) || range.is_empty() {
                    continue;
                }
                let child = self.child(*side);
                let tbl_ref_ids = child.tbl_ref_ids();
                if tbl_ref_ids.len() != 1 || !catalog.is_inline_view(tbl_ref_ids[0]) {
                    continue;
                }
                let tuple_ids = child.output_tuple_ids();
                for (index, source) in src_to_output.sources_mut().enumerate() {
                    if range.contains(&index) {
                        let inner = std::mem::replace(source, Expr::null());
                        *source = inner.wrap_with_tuple_is_null(tuple_ids.clone(), *side);
                    }
                }
                tracing::trace!(
                    "wrapped {} {} side columns of join {} with tuple-is-null",
                    range.len(),
                    side,
                    self.id
                );
            }
        }

        self.output_smap = SubstitutionMap::compose_and_replace(&self.output_smap, &copy_map);
        tracing::debug!(
            "join {} output tuple {} with {} slots",
            self.id,
            output,
            src_to_output.len()
        );
        self.src_to_output = Some(src_to_output);
        self.side_ranges = side_ranges;
        self.output_tuple = Some(output);
        Ok(())
    }
}

/// Copy every slot of `child` a parent can read into `output`
fn copy_child_slots(
    catalog: &mut DescriptorTable,
    child: &PlanNode,
    output: TupleId,
    force_nullable: bool,
    copy_map: &mut SubstitutionMap,
) -> Result<()> {
    let source_tuples = if child.is_join() {
        child.output_tuple_ids()
    } else {
        child.output_tbl_ref_ids()
    };
    for tuple in source_tuples {
        // Slots of a nested join's output stay nullable when that output
        // is itself outer-joined further up
        let inherited_nullable = child.is_join() && catalog.is_outer_joined(tuple);
        let slots = catalog.tuple(tuple)?.slot_ids().to_vec();
        for slot in slots {
            if !is_materialized_by_child(catalog, slot, tuple, child.output_smap())? {
                tracing::trace!("skipping unreachable slot {} of tuple {}", slot, tuple);
                continue;
            }
            let copy = catalog.copy_slot_descriptor(output, slot)?;
            if force_nullable || inherited_nullable {
                catalog.set_nullable(copy, true)?;
            }
            copy_map.put(Expr::slot(slot, tuple), Expr::slot(copy, output));
        }
    }
    Ok(())
}

/// A slot is reachable when it is materialized, or when the child's output
/// map defines it through materialized slots only.
fn is_materialized_by_child(
    catalog: &DescriptorTable,
    slot: SlotId,
    tuple: TupleId,
    smap: &SubstitutionMap,
) -> Result<bool> {
    if catalog.slot(slot)?.is_materialized() {
        return Ok(true);
    }
    let Some(expr) = smap.get(&Expr::slot(slot, tuple)) else {
        return Ok(false);
    };
    for slot_ref in expr.slot_refs() {
        if !catalog.slot(slot_ref.slot)?.is_materialized() {
            return Ok(false);
        }
    }
    Ok(true)
}

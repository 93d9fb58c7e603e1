//! Intermediate tuple construction

use super::join_node::JoinNode;
use crate::catalog::{DescriptorTable, TupleId, TupleKind};
use crate::error::{Error, Result};
use crate::smap::SubstitutionMap;
use crate::types::{Expr, NullSide};
use std::collections::HashMap;

impl JoinNode {
    /// Lay out the rows the join's execution step reads, then rewrite the
    /// source -> output map and the conjuncts to read them.
    pub(super) fn compute_intermediate_tuple(
        &mut self,
        catalog: &mut DescriptorTable,
    ) -> Result<()> {
        let missing_map = || Error::MissingSourceMap(self.id.as_u32());
        if self.src_to_output.is_none() {
            return Err(missing_map());
        }
        let output = self.output_tuple.ok_or_else(missing_map)?;

        let left_tuple = catalog.create_tuple_descriptor(TupleKind::JoinIntermediate);
        let right_tuple = catalog.create_tuple_descriptor(TupleKind::JoinIntermediate);
        let mut intermediate = vec![left_tuple, right_tuple];
        // The mark slot is produced by the join itself
        if self.is_mark
            && let Some(relation) = self.relation
            && let Some(mark) = catalog.get_mark_tuple(relation)
        {
            intermediate.push(mark);
        }

        let (left_nullable, right_nullable) = self.join_op.intermediate_nullable();
        let (copy_left, copy_right) = self
            .algorithm
            .need_to_copy_sides(self.join_op, &self.config);

        let mut origin_to_intermediate = SubstitutionMap::new();
        // Keyed by side as well: two children may share a tuple list
        let mut origin_tuples: HashMap<(NullSide, Vec<TupleId>), TupleId> = HashMap::new();
        for (side, tuple, copy, nullable) in [
            (NullSide::Left, left_tuple, copy_left, left_nullable),
            (NullSide::Right, right_tuple, copy_right, right_nullable),
        ] {
            if copy {
                let child = self.child(side);
                let child_tuples = child.output_tuple_ids();
                for child_tuple in &child_tuples {
                    // Keeps outer-joined nested outputs nullable once the
                    // output slots are re-derived from these copies
                    let inherited = child.is_join() && catalog.is_outer_joined(*child_tuple);
                    for slot in catalog.materialized_slots(*child_tuple)? {
                        let copy = catalog.copy_slot_descriptor(tuple, slot)?;
                        if nullable || inherited {
                            catalog.set_nullable(copy, true)?;
                        }
                        origin_to_intermediate
                            .put(Expr::slot(slot, *child_tuple), Expr::slot(copy, tuple));
                    }
                }
                origin_tuples.insert((side, child_tuples), tuple);
            }
            catalog.compute_mem_layout(tuple)?;
        }
        tracing::trace!(
            "join {} copied {} slots into intermediate tuples {} and {}",
            self.id,
            origin_to_intermediate.len(),
            left_tuple,
            right_tuple
        );

        let id = self.id.as_u32();
        let src_to_output = self
            .src_to_output
            .as_mut()
            .ok_or(Error::MissingSourceMap(id))?;
        src_to_output.substitute_lhs(
            &origin_to_intermediate,
            catalog,
            self.config.preserve_projection_types,
        )?;
        self.algorithm.compute_other_conjuncts(&origin_to_intermediate);
        for conjunct in &mut self.conjuncts {
            *conjunct = conjunct.substitute(&origin_to_intermediate);
        }
        for source in src_to_output.sources_mut() {
            source.replace_tuple_is_null_ids(&origin_tuples);
        }

        let slots = catalog.tuple(output)?.slot_ids().to_vec();
        if slots.len() != src_to_output.len() {
            return Err(Error::LengthMismatch {
                expected: slots.len(),
                found: src_to_output.len(),
            });
        }

        // Rewriting may change nullability; derive it again from the sources
        catalog.reopen_layout(output)?;
        for (slot, source) in slots.iter().zip(src_to_output.sources()) {
            let nullable = source.is_nullable(catalog)?;
            catalog.set_nullable(*slot, nullable)?;
        }
        src_to_output.recalculate_nullable_info_for_slot_in_rhs(catalog)?;
        // A null side stays nullable even when its sources are not guarded
        let rules = self.join_op.output_rules();
        for (side, range) in &self.side_ranges {
            if rules.forces_nullable(*side) {
                for slot in &slots[range.clone()] {
                    catalog.set_nullable(*slot, true)?;
                }
            }
        }
        catalog.compute_stat_and_mem_layout(output)?;

        self.intermediate_tuples = intermediate;
        Ok(())
    }
}

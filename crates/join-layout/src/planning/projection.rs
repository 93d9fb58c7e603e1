//! Projection pushdown into a join

use super::join_node::JoinNode;
use crate::catalog::DescriptorTable;
use crate::error::{Error, Result};
use crate::smap::SubstitutionMap;
use crate::types::Expr;

impl JoinNode {
    /// Adopt the output map a parent wants this join to produce.
    ///
    /// Targets that are plain slot references, or that read anything other
    /// than this join's output tuple, pass through. Every other target is
    /// computed by the join itself: it gets a new output slot, its
    /// expression is rewritten onto the intermediate tuples, and the
    /// parent-facing entry is replaced by a reference to the new slot.
    pub fn set_output_smap(
        &mut self,
        parent_map: SubstitutionMap,
        catalog: &mut DescriptorTable,
    ) -> Result<()> {
        let id = self.id.as_u32();
        let output = self.output_tuple.ok_or(Error::MissingSourceMap(id))?;
        let src_to_output = self
            .src_to_output
            .as_mut()
            .ok_or(Error::MissingSourceMap(id))?;
        let output_to_src = src_to_output.invert();

        let mut targets = Vec::with_capacity(parent_map.len());
        let mut changed = false;
        for target in parent_map.targets() {
            if target.is_slot_ref() || !target.is_bound(&[output]) {
                targets.push(target.clone());
                continue;
            }
            if !changed {
                catalog.reopen_layout(output)?;
            }
            let data_type = target.data_type(catalog)?;
            let slot = catalog.add_slot_descriptor(output, data_type)?;
            catalog.init_slot_from_expr(slot, target)?;
            catalog.set_materialized(slot, true)?;
            src_to_output.put(target.substitute(&output_to_src), Expr::slot(slot, output));
            catalog.materialize_src_expr(slot)?;
            tracing::trace!("join {} computes {} into slot {}", self.id, target, slot);
            targets.push(Expr::slot(slot, output));
            changed = true;
        }

        self.output_smap = parent_map;
        if changed {
            self.output_smap.update_rhs_exprs(targets)?;
            catalog.compute_stat_and_mem_layout(output)?;
        }
        Ok(())
    }
}

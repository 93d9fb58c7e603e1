//! Join algorithm hooks
//!
//! The tuple builders are generic over the physical algorithm. The few
//! decisions that depend on it (which sides need an intermediate copy, which
//! conjuncts are evaluated against the intermediate row) are answered here.

use super::join_op::JoinOperator;
use crate::catalog::SlotId;
use crate::config::LayoutConfig;
use crate::smap::SubstitutionMap;
use crate::types::Expr;

#[derive(Debug, Clone, PartialEq)]
pub enum JoinAlgorithm {
    /// Builds a hash table on the right side and probes it with the left
    Hash {
        /// Equi-join predicates used as hash keys, bound to the children
        eq_conjuncts: Vec<Expr>,
        /// Predicates checked on each matched pair after the probe
        other_conjuncts: Vec<Expr>,
        mark_conjuncts: Vec<Expr>,
    },
    /// Evaluates every predicate on every pair of rows
    NestedLoop {
        join_conjuncts: Vec<Expr>,
        mark_conjuncts: Vec<Expr>,
    },
    /// Merges two inputs sorted on the comparison keys
    Merge {
        cmp_conjuncts: Vec<Expr>,
        other_conjuncts: Vec<Expr>,
    },
}

impl JoinAlgorithm {
    pub fn hash(eq_conjuncts: Vec<Expr>) -> Self {
        JoinAlgorithm::Hash {
            eq_conjuncts,
            other_conjuncts: Vec::new(),
            mark_conjuncts: Vec::new(),
        }
    }

    pub fn nested_loop() -> Self {
        JoinAlgorithm::NestedLoop {
            join_conjuncts: Vec::new(),
            mark_conjuncts: Vec::new(),
        }
    }

    pub fn merge(cmp_conjuncts: Vec<Expr>) -> Self {
        JoinAlgorithm::Merge {
            cmp_conjuncts,
            other_conjuncts: Vec::new(),
        }
    }

    /// Set the predicates evaluated on matched rows. For nested loop joins
    /// these are the join conjuncts.
    pub fn with_other_conjuncts(mut self, conjuncts: Vec<Expr>) -> Self {
        match &mut self {
            JoinAlgorithm::Hash {
                other_conjuncts, ..
            }
            | JoinAlgorithm::Merge {
                other_conjuncts, ..
            } => *other_conjuncts = conjuncts,
            JoinAlgorithm::NestedLoop { join_conjuncts, .. } => *join_conjuncts = conjuncts,
        }
        self
    }

    /// Set the predicates that compute the mark value. Merge joins never
    /// produce a mark and ignore them.
    pub fn with_mark_conjuncts(mut self, conjuncts: Vec<Expr>) -> Self {
        match &mut self {
            JoinAlgorithm::Hash { mark_conjuncts, .. }
            | JoinAlgorithm::NestedLoop { mark_conjuncts, .. } => *mark_conjuncts = conjuncts,
            JoinAlgorithm::Merge { .. } => {}
        }
        self
    }

    pub fn node_name(&self) -> &'static str {
        match self {
            JoinAlgorithm::Hash { .. } => "HASH JOIN",
            JoinAlgorithm::NestedLoop { .. } => "NESTED LOOP JOIN",
            JoinAlgorithm::Merge { .. } => "MERGE JOIN",
        }
    }

    /// Whether the (left, right) child needs an intermediate tuple.
    ///
    /// Semi and anti joins only read the non-output side during the probe,
    /// unless a conjunct evaluated on the joined row refers to it.
    pub fn need_to_copy_sides(&self, op: JoinOperator, config: &LayoutConfig) -> (bool, bool) {
        let post_probe_conjuncts = match self {
            JoinAlgorithm::Hash {
                other_conjuncts,
                mark_conjuncts,
                ..
            } => !other_conjuncts.is_empty() || !mark_conjuncts.is_empty(),
            JoinAlgorithm::NestedLoop {
                join_conjuncts,
                mark_conjuncts,
            } => !join_conjuncts.is_empty() || !mark_conjuncts.is_empty(),
            JoinAlgorithm::Merge { .. } => return (true, true),
        };
        if !config.prune_unused_intermediate_sides || post_probe_conjuncts {
            return (true, true);
        }
        if op.is_left_semi_or_anti() {
            (true, false)
        } else if op.is_right_semi_or_anti() {
            (false, true)
        } else {
            (true, true)
        }
    }

    /// Rewrite the conjuncts evaluated on the joined row so they read the
    /// intermediate tuples. Hash and merge keys stay bound to the children.
    pub fn compute_other_conjuncts(&mut self, origin_to_intermediate: &SubstitutionMap) {
        let rewrite = |conjuncts: &mut Vec<Expr>| {
            for conjunct in conjuncts.iter_mut() {
                *conjunct = conjunct.substitute(origin_to_intermediate);
            }
        };
        match self {
            JoinAlgorithm::Hash {
                other_conjuncts,
                mark_conjuncts,
                ..
            } => {
                rewrite(other_conjuncts);
                rewrite(mark_conjuncts);
            }
            JoinAlgorithm::NestedLoop {
                join_conjuncts,
                mark_conjuncts,
            } => {
                rewrite(join_conjuncts);
                rewrite(mark_conjuncts);
            }
            JoinAlgorithm::Merge {
                other_conjuncts, ..
            } => rewrite(other_conjuncts),
        }
    }

    /// Slots referenced by the join conjuncts, sorted and de-duplicated
    pub fn compute_slot_ids_for_join_conjuncts(&self) -> Vec<SlotId> {
        let mut slots: Vec<SlotId> = self
            .join_conjuncts()
            .into_iter()
            .flat_map(|conjunct| conjunct.slot_refs())
            .map(|slot_ref| slot_ref.slot)
            .collect();
        slots.sort();
        slots.dedup();
        slots
    }

    /// Every conjunct the algorithm evaluates
    pub fn join_conjuncts(&self) -> Vec<&Expr> {
        match self {
            JoinAlgorithm::Hash {
                eq_conjuncts,
                other_conjuncts,
                mark_conjuncts,
            } => eq_conjuncts
                .iter()
                .chain(other_conjuncts)
                .chain(mark_conjuncts)
                .collect(),
            JoinAlgorithm::NestedLoop {
                join_conjuncts,
                mark_conjuncts,
            } => join_conjuncts.iter().chain(mark_conjuncts).collect(),
            JoinAlgorithm::Merge {
                cmp_conjuncts,
                other_conjuncts,
            } => cmp_conjuncts.iter().chain(other_conjuncts).collect(),
        }
    }
}

//! Expression substitution maps
//!
//! A substitution map is an ordered list of `source -> target` pairs used to
//! rewrite expression trees from one row layout to another. Order is part of
//! the contract: position `i` of a map built from another map lines up with
//! position `i` of the original. Entries are stored as explicit pairs so a
//! source can never drift apart from its target.

use crate::catalog::{DescriptorTable, TupleId};
use crate::error::{Error, Result, check_state};
use crate::types::{Expr, SlotRef};
use std::collections::HashSet;
use std::fmt;

/// One rewrite rule: occurrences of `source` become `target`
#[derive(Debug, Clone, PartialEq)]
pub struct Substitution {
    pub source: Expr,
    pub target: Expr,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubstitutionMap {
    entries: Vec<Substitution>,
}

impl SubstitutionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pair. Does not check whether `source` is already mapped.
    pub fn put(&mut self, source: Expr, target: Expr) {
        self.entries.push(Substitution { source, target });
    }

    pub fn push(&mut self, entry: Substitution) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Substitution> {
        self.entries.iter()
    }

    pub fn sources(&self) -> impl Iterator<Item = &Expr> {
        self.entries.iter().map(|entry| &entry.source)
    }

    pub fn targets(&self) -> impl Iterator<Item = &Expr> {
        self.entries.iter().map(|entry| &entry.target)
    }

    /// Mutable access to the sources; targets stay fixed
    pub fn sources_mut(&mut self) -> impl Iterator<Item = &mut Expr> {
        self.entries.iter_mut().map(|entry| &mut entry.source)
    }

    /// Target of the first entry whose source equals `source`
    pub fn get(&self, source: &Expr) -> Option<&Expr> {
        self.entries
            .iter()
            .find(|entry| entry.source == *source)
            .map(|entry| &entry.target)
    }

    pub fn contains_mapping_for(&self, source: &Expr) -> bool {
        self.get(source).is_some()
    }

    /// The slot referenced by the target at `index`
    pub fn target_slot(&self, index: usize) -> Result<SlotRef> {
        let entry = self.entries.get(index).ok_or_else(|| {
            Error::Internal(format!(
                "substitution index {} out of range for map of {} entries",
                index,
                self.len()
            ))
        })?;
        entry
            .target
            .as_slot_ref()
            .ok_or_else(|| Error::NotASlotRef(entry.target.to_string()))
    }

    /// A map sending each slot reference to itself
    pub fn identity(slots: impl IntoIterator<Item = SlotRef>) -> Self {
        let mut smap = Self::new();
        for slot in slots {
            smap.put(Expr::Slot(slot), Expr::Slot(slot));
        }
        smap
    }

    /// Swap sources and targets
    pub fn invert(&self) -> Self {
        let mut inverted = Self::new();
        for entry in &self.entries {
            inverted.put(entry.target.clone(), entry.source.clone());
        }
        inverted
    }

    /// Rewrite the sources of `f` with `g` as the rule set.
    ///
    /// Each `(s, t)` of `f` becomes `(s.substitute(g), t)`. Used to push
    /// output-layer expressions down onto another layer's slots.
    pub fn compose(f: &Self, g: &Self) -> Self {
        let mut result = Self::new();
        for entry in &f.entries {
            result.put(entry.source.substitute(g), entry.target.clone());
        }
        result
    }

    /// Chain `f` into `g`.
    ///
    /// For every `b -> c` of `g`, each entry `a -> fn(b)` of `f` becomes
    /// `a -> fn(c)`. Entries of `g` no right-hand side of `f` refers to are
    /// added unchanged, then the entries of `f` whose source is still
    /// unmapped.
    pub fn compose_and_replace(f: &Self, g: &Self) -> Self {
        if f.is_empty() {
            return g.clone();
        }
        if g.is_empty() {
            return f.clone();
        }

        let mut result = Self::new();
        for g_entry in &g.entries {
            let mut matched = false;
            for f_entry in &f.entries {
                if f_entry.target.contains(&g_entry.source) {
                    if !result.contains_mapping_for(&f_entry.source) {
                        result.put(f_entry.source.clone(), f_entry.target.substitute(g));
                    }
                    matched = true;
                }
            }
            if !matched {
                result.push(g_entry.clone());
            }
        }
        for f_entry in &f.entries {
            if !result.contains_mapping_for(&f_entry.source) {
                result.push(f_entry.clone());
            }
        }
        result
    }

    /// Entries of `f`, then the entries of `g` whose source `f` does not map
    pub fn combine(f: &Self, g: &Self) -> Self {
        let mut result = f.clone();
        for entry in &g.entries {
            if !f.contains_mapping_for(&entry.source) {
                result.push(entry.clone());
            }
        }
        result
    }

    /// Entries of `full` whose target is not a target of `partial`
    pub fn subtract(full: &Self, partial: &Self) -> Self {
        let produced: Vec<&Expr> = partial.targets().collect();
        let mut result = Self::new();
        for entry in &full.entries {
            if !produced.contains(&&entry.target) {
                result.push(entry.clone());
            }
        }
        result
    }

    /// Resolve the sources of `copy` through `child`.
    ///
    /// The result has the length and order of `copy`. A source that `child`
    /// maps is replaced by the expression it maps to; any other source is
    /// kept as it is.
    pub fn resolve_sources(copy: &Self, child: &Self) -> Self {
        let mut result = Self::new();
        for entry in &copy.entries {
            let source = child
                .get(&entry.source)
                .cloned()
                .unwrap_or_else(|| entry.source.clone());
            result.put(source, entry.target.clone());
        }
        result
    }

    /// Rewrite every source through `rule`.
    ///
    /// With `preserve_types`, a rewritten source whose type differs from the
    /// original is cast back to the original type.
    pub fn substitute_lhs(
        &mut self,
        rule: &Self,
        catalog: &DescriptorTable,
        preserve_types: bool,
    ) -> Result<()> {
        for entry in &mut self.entries {
            let rewritten = entry.source.substitute(rule);
            if preserve_types {
                let original = entry.source.data_type(catalog)?;
                if rewritten.data_type(catalog)? != original {
                    entry.source = Expr::cast(rewritten, original);
                    continue;
                }
            }
            entry.source = rewritten;
        }
        Ok(())
    }

    /// Replace every source, position by position
    pub fn update_lhs_exprs(&mut self, sources: Vec<Expr>) -> Result<()> {
        self.check_len(sources.len())?;
        for (entry, source) in self.entries.iter_mut().zip(sources) {
            entry.source = source;
        }
        Ok(())
    }

    /// Replace every target, position by position
    pub fn update_rhs_exprs(&mut self, targets: Vec<Expr>) -> Result<()> {
        self.check_len(targets.len())?;
        for (entry, target) in self.entries.iter_mut().zip(targets) {
            entry.target = target;
        }
        Ok(())
    }

    /// Set each target slot's nullability to that of its source expression
    pub fn recalculate_nullable_info_for_slot_in_rhs(
        &self,
        catalog: &mut DescriptorTable,
    ) -> Result<()> {
        for entry in &self.entries {
            if let Some(target) = entry.target.as_slot_ref() {
                let nullable = entry.source.is_nullable(catalog)?;
                catalog.set_nullable(target.slot, nullable)?;
            }
        }
        Ok(())
    }

    /// Verify every target is a distinct slot of one of `tuples`
    pub fn check_slot_targets(&self, tuples: &[TupleId]) -> Result<()> {
        let mut seen = HashSet::new();
        for target in self.targets() {
            let slot_ref = target
                .as_slot_ref()
                .ok_or_else(|| Error::NotASlotRef(target.to_string()))?;
            check_state(tuples.contains(&slot_ref.tuple), || {
                format!(
                    "target slot {} belongs to tuple {}, expected one of {:?}",
                    slot_ref.slot, slot_ref.tuple, tuples
                )
            })?;
            check_state(seen.insert(slot_ref.slot), || {
                format!("slot {} is the target of more than one entry", slot_ref.slot)
            })?;
        }
        Ok(())
    }

    fn check_len(&self, found: usize) -> Result<()> {
        if found != self.len() {
            return Err(Error::LengthMismatch {
                expected: self.len(),
                found,
            });
        }
        Ok(())
    }
}

impl fmt::Display for SubstitutionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "smap(")?;
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}:{}", entry.source, entry.target)?;
        }
        write!(f, ")")
    }
}

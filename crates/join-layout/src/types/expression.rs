//! Expression trees over slots
//!
//! Expressions reference columns through [`SlotRef`]s, which name a slot in
//! the descriptor table. Type and nullability are not stored in the tree;
//! they are derived from the descriptor table on demand so that a slot's
//! flags can change while the expressions referencing it stay untouched.

use super::{DataType, Value};
use crate::catalog::{DescriptorTable, SlotId, TupleId};
use crate::error::Result;
use crate::smap::SubstitutionMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Display};

/// A reference to exactly one slot descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotRef {
    pub slot: SlotId,
    pub tuple: TupleId,
}

impl SlotRef {
    pub fn new(slot: SlotId, tuple: TupleId) -> Self {
        Self { slot, tuple }
    }
}

/// The side of a join whose row may be missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NullSide {
    Left,
    Right,
}

impl Display for NullSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NullSide::Left => write!(f, "LEFT"),
            NullSide::Right => write!(f, "RIGHT"),
        }
    }
}

/// True when the row of every listed tuple is absent on the tagged side
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TupleIsNull {
    pub tuple_ids: Vec<TupleId>,
    pub side: NullSide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add
                | BinaryOp::Subtract
                | BinaryOp::Multiply
                | BinaryOp::Divide
                | BinaryOp::Remainder
        )
    }

    fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Remainder => "%",
            BinaryOp::Equal => "=",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }
}

/// An expression, made up of nested operations over slots and literals.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A column, read from the slot it names.
    Slot(SlotRef),
    /// A constant value.
    Literal(Value),
    /// CAST(expr AS type)
    Cast(Box<Expr>, DataType),
    /// Arithmetic, comparison or logical operation of two operands.
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// NOT a
    Not(Box<Expr>),
    /// a IS NULL, or a IS NOT NULL when the flag is set.
    IsNull(Box<Expr>, bool),
    /// Function call with a resolved return type.
    Function {
        name: String,
        args: Vec<Expr>,
        return_type: DataType,
    },
    /// IF(cond, then, else)
    If(Box<Expr>, Box<Expr>, Box<Expr>),
    /// Tuple-is-null predicate produced by outer join NULL-side wrapping.
    TupleIsNull(TupleIsNull),
}

impl Expr {
    pub fn slot(slot: SlotId, tuple: TupleId) -> Self {
        Expr::Slot(SlotRef::new(slot, tuple))
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn null() -> Self {
        Expr::Literal(Value::Null)
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn eq(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Equal, lhs, rhs)
    }

    pub fn cast(expr: Expr, data_type: DataType) -> Self {
        Expr::Cast(Box::new(expr), data_type)
    }

    pub fn is_null(expr: Expr) -> Self {
        Expr::IsNull(Box::new(expr), false)
    }

    pub fn function(name: impl Into<String>, args: Vec<Expr>, return_type: DataType) -> Self {
        Expr::Function {
            name: name.into(),
            args,
            return_type,
        }
    }

    pub fn if_then_else(cond: Expr, then: Expr, otherwise: Expr) -> Self {
        Expr::If(Box::new(cond), Box::new(then), Box::new(otherwise))
    }

    /// The slot this expression names, if it is a bare slot reference
    pub fn as_slot_ref(&self) -> Option<SlotRef> {
        match self {
            Expr::Slot(slot_ref) => Some(*slot_ref),
            _ => None,
        }
    }

    pub fn is_slot_ref(&self) -> bool {
        matches!(self, Expr::Slot(_))
    }

    /// Direct children of this node
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Slot(_) | Expr::Literal(_) | Expr::TupleIsNull(_) => vec![],
            Expr::Cast(expr, _) | Expr::Not(expr) | Expr::IsNull(expr, _) => vec![expr.as_ref()],
            Expr::Binary(_, lhs, rhs) => vec![lhs.as_ref(), rhs.as_ref()],
            Expr::Function { args, .. } => args.iter().collect(),
            Expr::If(cond, then, otherwise) => {
                vec![cond.as_ref(), then.as_ref(), otherwise.as_ref()]
            }
        }
    }

    /// Rebuild this node with each child passed through `f`
    fn map_children(&self, f: &mut impl FnMut(&Expr) -> Expr) -> Expr {
        match self {
            Expr::Slot(_) | Expr::Literal(_) | Expr::TupleIsNull(_) => self.clone(),
            Expr::Cast(expr, ty) => Expr::Cast(Box::new(f(expr.as_ref())), *ty),
            Expr::Not(expr) => Expr::Not(Box::new(f(expr.as_ref()))),
            Expr::IsNull(expr, negated) => Expr::IsNull(Box::new(f(expr.as_ref())), *negated),
            Expr::Binary(op, lhs, rhs) => {
                Expr::Binary(*op, Box::new(f(lhs.as_ref())), Box::new(f(rhs.as_ref())))
            }
            Expr::Function {
                name,
                args,
                return_type,
            } => Expr::Function {
                name: name.clone(),
                args: args.iter().map(|arg| f(arg)).collect(),
                return_type: *return_type,
            },
            Expr::If(cond, then, otherwise) => Expr::If(
                Box::new(f(cond.as_ref())),
                Box::new(f(then.as_ref())),
                Box::new(f(otherwise.as_ref())),
            ),
        }
    }

    /// Collect every slot reference in this tree, in pre-order
    pub fn collect_slot_refs(&self, out: &mut Vec<SlotRef>) {
        if let Expr::Slot(slot_ref) = self {
            out.push(*slot_ref);
        }
        for child in self.children() {
            child.collect_slot_refs(out);
        }
    }

    pub fn slot_refs(&self) -> Vec<SlotRef> {
        let mut out = Vec::new();
        self.collect_slot_refs(&mut out);
        out
    }

    /// Whether `other` appears anywhere in this tree (including the root)
    pub fn contains(&self, other: &Expr) -> bool {
        self == other || self.children().iter().any(|child| child.contains(other))
    }

    pub fn contains_tuple_is_null(&self) -> bool {
        matches!(self, Expr::TupleIsNull(_))
            || self
                .children()
                .iter()
                .any(|child| child.contains_tuple_is_null())
    }

    /// Whether every slot referenced here belongs to one of `tuple_ids`
    pub fn is_bound(&self, tuple_ids: &[TupleId]) -> bool {
        self.slot_refs()
            .iter()
            .all(|slot_ref| tuple_ids.contains(&slot_ref.tuple))
    }

    /// Rewrite this expression using `smap` as a set of rewrite rules.
    ///
    /// A node equal to a source of the map is replaced by its target as a
    /// whole; otherwise its children are rewritten.
    pub fn substitute(&self, smap: &SubstitutionMap) -> Expr {
        if let Some(target) = smap.get(self) {
            return target.clone();
        }
        self.map_children(&mut |child| child.substitute(smap))
    }

    /// Guard this expression so it evaluates to NULL when the row of
    /// `tuple_ids` is missing on `side`.
    pub fn wrap_with_tuple_is_null(self, tuple_ids: Vec<TupleId>, side: NullSide) -> Expr {
        Expr::if_then_else(
            Expr::TupleIsNull(TupleIsNull { tuple_ids, side }),
            Expr::null(),
            self,
        )
    }

    /// Point every tuple-is-null predicate whose side and tuple list are a
    /// key of `mapping` at the mapped tuple.
    pub fn replace_tuple_is_null_ids(
        &mut self,
        mapping: &HashMap<(NullSide, Vec<TupleId>), TupleId>,
    ) {
        match self {
            Expr::TupleIsNull(predicate) => {
                let key = (predicate.side, predicate.tuple_ids.clone());
                if let Some(target) = mapping.get(&key) {
                    predicate.tuple_ids = vec![*target];
                }
            }
            Expr::Slot(_) | Expr::Literal(_) => {}
            Expr::Cast(expr, _) | Expr::Not(expr) | Expr::IsNull(expr, _) => {
                expr.replace_tuple_is_null_ids(mapping)
            }
            Expr::Binary(_, lhs, rhs) => {
                lhs.replace_tuple_is_null_ids(mapping);
                rhs.replace_tuple_is_null_ids(mapping);
            }
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.replace_tuple_is_null_ids(mapping);
                }
            }
            Expr::If(cond, then, otherwise) => {
                cond.replace_tuple_is_null_ids(mapping);
                then.replace_tuple_is_null_ids(mapping);
                otherwise.replace_tuple_is_null_ids(mapping);
            }
        }
    }

    /// The type this expression produces
    pub fn data_type(&self, catalog: &DescriptorTable) -> Result<DataType> {
        Ok(match self {
            Expr::Slot(slot_ref) => catalog.slot(slot_ref.slot)?.data_type(),
            Expr::Literal(value) => value.data_type(),
            Expr::Cast(_, ty) => *ty,
            Expr::Binary(op, lhs, rhs) => {
                if op.is_arithmetic() {
                    lhs.data_type(catalog)?.wider(&rhs.data_type(catalog)?)
                } else {
                    DataType::Boolean
                }
            }
            Expr::Not(_) | Expr::IsNull(_, _) | Expr::TupleIsNull(_) => DataType::Boolean,
            Expr::Function { return_type, .. } => *return_type,
            Expr::If(_, then, otherwise) => {
                let then_type = then.data_type(catalog)?;
                if then_type == DataType::Null {
                    otherwise.data_type(catalog)?
                } else {
                    then_type
                }
            }
        })
    }

    /// Whether this expression can evaluate to NULL
    pub fn is_nullable(&self, catalog: &DescriptorTable) -> Result<bool> {
        Ok(match self {
            Expr::Slot(slot_ref) => catalog.slot(slot_ref.slot)?.is_nullable(),
            Expr::Literal(value) => value.is_null(),
            Expr::Cast(expr, _) | Expr::Not(expr) => expr.is_nullable(catalog)?,
            // Division by zero yields NULL
            Expr::Binary(BinaryOp::Divide | BinaryOp::Remainder, _, _) => true,
            Expr::Binary(_, lhs, rhs) => lhs.is_nullable(catalog)? || rhs.is_nullable(catalog)?,
            Expr::IsNull(_, _) | Expr::TupleIsNull(_) => false,
            Expr::Function { name, args, .. } => {
                if name.eq_ignore_ascii_case("coalesce") {
                    let mut all = true;
                    for arg in args {
                        all &= arg.is_nullable(catalog)?;
                    }
                    all
                } else {
                    let mut any = false;
                    for arg in args {
                        any |= arg.is_nullable(catalog)?;
                    }
                    any
                }
            }
            Expr::If(_, then, otherwise) => {
                then.is_nullable(catalog)? || otherwise.is_nullable(catalog)?
            }
        })
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Slot(slot_ref) => write!(f, "<slot {}>", slot_ref.slot),
            Expr::Literal(value) => write!(f, "{}", value),
            Expr::Cast(expr, ty) => write!(f, "CAST({} AS {})", expr, ty),
            Expr::Binary(op, lhs, rhs) => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
            Expr::Not(expr) => write!(f, "(NOT {})", expr),
            Expr::IsNull(expr, negated) => {
                write!(f, "({} IS {}NULL)", expr, if *negated { "NOT " } else { "" })
            }
            Expr::Function { name, args, .. } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::If(cond, then, otherwise) => write!(f, "if({}, {}, {})", cond, then, otherwise),
            Expr::TupleIsNull(predicate) => {
                write!(f, "TupleIsNull(")?;
                for (i, tid) in predicate.tuple_ids.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", tid)?;
                }
                write!(f, "; {})", predicate.side)
            }
        }
    }
}

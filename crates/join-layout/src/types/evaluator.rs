//! Row-level expression evaluation
//!
//! Evaluates expressions against a single joined row, where each tuple of the
//! row is either present (its slots carry values) or absent because an outer
//! join found no match for it. Used to check that NULL-side rewrites produce
//! the values a join would emit.

use super::expression::{BinaryOp, Expr};
use super::value::Value;
use crate::catalog::{SlotId, TupleId};
use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// A row assembled from several tuples, some of which may be missing
#[derive(Debug, Clone, Default)]
pub struct JoinedRow {
    values: HashMap<SlotId, Value>,
    absent: HashSet<TupleId>,
}

impl JoinedRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value of a slot
    pub fn with_value(mut self, slot: SlotId, value: impl Into<Value>) -> Self {
        self.values.insert(slot, value.into());
        self
    }

    /// Mark a tuple as missing from this row
    pub fn with_absent(mut self, tuple: TupleId) -> Self {
        self.absent.insert(tuple);
        self
    }

    pub fn is_absent(&self, tuple: TupleId) -> bool {
        self.absent.contains(&tuple)
    }

    /// Evaluate an expression against this row
    pub fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Slot(slot_ref) => {
                if self.is_absent(slot_ref.tuple) {
                    return Ok(Value::Null);
                }
                self.values.get(&slot_ref.slot).cloned().ok_or_else(|| {
                    Error::InvalidValue(format!("no value bound for slot {}", slot_ref.slot))
                })
            }
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Cast(inner, _) => self.eval(inner),
            Expr::Not(inner) => match self.eval(inner)? {
                Value::Null => Ok(Value::Null),
                Value::Bool(b) => Ok(Value::Bool(!b)),
                other => Err(type_mismatch("BOOLEAN", &other)),
            },
            Expr::IsNull(inner, negated) => {
                let is_null = self.eval(inner)?.is_null();
                Ok(Value::Bool(is_null != *negated))
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                eval_binary(*op, lhs, rhs)
            }
            Expr::Function { name, args, .. } => {
                if name.eq_ignore_ascii_case("coalesce") {
                    for arg in args {
                        let value = self.eval(arg)?;
                        if !value.is_null() {
                            return Ok(value);
                        }
                    }
                    Ok(Value::Null)
                } else {
                    Err(Error::InvalidValue(format!(
                        "function {} cannot be evaluated",
                        name
                    )))
                }
            }
            Expr::If(cond, then, otherwise) => match self.eval(cond)? {
                Value::Bool(true) => self.eval(then),
                Value::Bool(false) | Value::Null => self.eval(otherwise),
                other => Err(type_mismatch("BOOLEAN", &other)),
            },
            Expr::TupleIsNull(predicate) => Ok(Value::Bool(
                !predicate.tuple_ids.is_empty()
                    && predicate.tuple_ids.iter().all(|tid| self.is_absent(*tid)),
            )),
        }
    }
}

fn type_mismatch(expected: &str, found: &Value) -> Error {
    Error::TypeMismatch {
        expected: expected.into(),
        found: found.data_type().to_string(),
    }
}

/// The operand of a logical operator that is not a boolean
fn non_boolean<'a>(lhs: &'a Value, rhs: &'a Value) -> &'a Value {
    if matches!(lhs, Value::Bool(_)) { rhs } else { lhs }
}

fn eval_binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value> {
    match op {
        BinaryOp::And => match (&lhs, &rhs) {
            (Value::Bool(false), _) | (_, Value::Bool(false)) => Ok(Value::Bool(false)),
            (Value::Bool(true), Value::Bool(true)) => Ok(Value::Bool(true)),
            (Value::Null | Value::Bool(_), Value::Null | Value::Bool(_)) => Ok(Value::Null),
            _ => Err(type_mismatch("BOOLEAN", non_boolean(&lhs, &rhs))),
        },
        BinaryOp::Or => match (&lhs, &rhs) {
            (Value::Bool(true), _) | (_, Value::Bool(true)) => Ok(Value::Bool(true)),
            (Value::Bool(false), Value::Bool(false)) => Ok(Value::Bool(false)),
            (Value::Null | Value::Bool(_), Value::Null | Value::Bool(_)) => Ok(Value::Null),
            _ => Err(type_mismatch("BOOLEAN", non_boolean(&lhs, &rhs))),
        },
        _ if lhs.is_null() || rhs.is_null() => Ok(Value::Null),
        BinaryOp::Equal => Ok(Value::Bool(compare(&lhs, &rhs)? == Ordering::Equal)),
        BinaryOp::NotEqual => Ok(Value::Bool(compare(&lhs, &rhs)? != Ordering::Equal)),
        BinaryOp::LessThan => Ok(Value::Bool(compare(&lhs, &rhs)? == Ordering::Less)),
        BinaryOp::LessThanOrEqual => Ok(Value::Bool(compare(&lhs, &rhs)? != Ordering::Greater)),
        BinaryOp::GreaterThan => Ok(Value::Bool(compare(&lhs, &rhs)? == Ordering::Greater)),
        BinaryOp::GreaterThanOrEqual => Ok(Value::Bool(compare(&lhs, &rhs)? != Ordering::Less)),
        _ => arithmetic(op, &lhs, &rhs),
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Result<Ordering> {
    match (lhs, rhs) {
        (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        _ => {
            if let (Some(a), Some(b)) = (lhs.as_i128(), rhs.as_i128()) {
                return Ok(a.cmp(&b));
            }
            match (lhs.as_f64(), rhs.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b).ok_or_else(|| {
                    Error::InvalidValue(format!("cannot compare {} and {}", lhs, rhs))
                }),
                _ => Err(Error::TypeMismatch {
                    expected: lhs.data_type().to_string(),
                    found: rhs.data_type().to_string(),
                }),
            }
        }
    }
}

fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value> {
    if let (Some(a), Some(b)) = (lhs.as_i128(), rhs.as_i128()) {
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Subtract => a.checked_sub(b),
            BinaryOp::Multiply => a.checked_mul(b),
            BinaryOp::Divide | BinaryOp::Remainder if b == 0 => return Ok(Value::Null),
            BinaryOp::Divide => a.checked_div(b),
            BinaryOp::Remainder => a.checked_rem(b),
            _ => None,
        };
        return result
            .map(|n| match i64::try_from(n) {
                Ok(n) => Value::I64(n),
                Err(_) => Value::I128(n),
            })
            .ok_or_else(|| {
                Error::InvalidValue(format!("integer overflow in {} {:?} {}", lhs, op, rhs))
            });
    }
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => Ok(match op {
            BinaryOp::Add => Value::F64(a + b),
            BinaryOp::Subtract => Value::F64(a - b),
            BinaryOp::Multiply => Value::F64(a * b),
            BinaryOp::Divide | BinaryOp::Remainder if b == 0.0 => Value::Null,
            BinaryOp::Divide => Value::F64(a / b),
            BinaryOp::Remainder => Value::F64(a % b),
            _ => return Err(Error::Internal(format!("{:?} is not arithmetic", op))),
        }),
        _ => Err(Error::TypeMismatch {
            expected: "numeric operands".into(),
            found: format!("{} and {}", lhs.data_type(), rhs.data_type()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::expression::NullSide;

    #[test]
    fn test_absent_tuple_reads_null() {
        let t = TupleId::new(1);
        let s = SlotId::new(3);
        let row = JoinedRow::new().with_value(s, 5).with_absent(t);
        assert_eq!(row.eval(&Expr::slot(s, t)).unwrap(), Value::Null);
    }

    #[test]
    fn test_tuple_is_null_guard() {
        let t = TupleId::new(1);
        let s = SlotId::new(3);
        // A constant survives a missing row unless guarded.
        let constant = Expr::literal(1);
        let guarded = constant.clone().wrap_with_tuple_is_null(vec![t], NullSide::Right);

        let missing = JoinedRow::new().with_absent(t);
        assert_eq!(missing.eval(&constant).unwrap(), Value::I32(1));
        assert_eq!(missing.eval(&guarded).unwrap(), Value::Null);

        let present = JoinedRow::new().with_value(s, 2);
        assert_eq!(present.eval(&guarded).unwrap(), Value::I32(1));
    }

    #[test]
    fn test_three_valued_logic() {
        let null = Expr::null();
        let t = Expr::literal(true);
        let f = Expr::literal(false);
        let row = JoinedRow::new();
        assert_eq!(
            row.eval(&Expr::binary(BinaryOp::And, null.clone(), f.clone())).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            row.eval(&Expr::binary(BinaryOp::And, null.clone(), t.clone())).unwrap(),
            Value::Null
        );
        assert_eq!(
            row.eval(&Expr::binary(BinaryOp::Or, null.clone(), t)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(row.eval(&Expr::eq(null, f)).unwrap(), Value::Null);
    }

    #[test]
    fn test_arithmetic_and_coalesce() {
        let row = JoinedRow::new();
        let sum = Expr::binary(BinaryOp::Add, Expr::literal(2), Expr::literal(40i64));
        assert_eq!(row.eval(&sum).unwrap(), Value::I64(42));
        let div = Expr::binary(BinaryOp::Divide, Expr::literal(1), Expr::literal(0));
        assert_eq!(row.eval(&div).unwrap(), Value::Null);
        let coalesce = Expr::function(
            "coalesce",
            vec![Expr::null(), Expr::literal("x")],
            crate::types::DataType::String,
        );
        assert_eq!(row.eval(&coalesce).unwrap(), Value::Str("x".into()));
    }
}

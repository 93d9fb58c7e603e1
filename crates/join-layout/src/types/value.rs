//! Literal SQL values

use super::DataType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A literal value inside an expression, or a cell of an evaluated row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(i128),
    F32(f32),
    F64(f64),
    Str(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The natural type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Bool(_) => DataType::Boolean,
            Value::I8(_) => DataType::TinyInt,
            Value::I16(_) => DataType::SmallInt,
            Value::I32(_) => DataType::Int,
            Value::I64(_) => DataType::BigInt,
            Value::I128(_) => DataType::LargeInt,
            Value::F32(_) => DataType::Float,
            Value::F64(_) => DataType::Double,
            Value::Str(_) => DataType::String,
        }
    }

    /// Integer view of the value, widened to i128
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::I8(n) => Some(*n as i128),
            Value::I16(n) => Some(*n as i128),
            Value::I32(n) => Some(*n as i128),
            Value::I64(n) => Some(*n as i128),
            Value::I128(n) => Some(*n),
            _ => None,
        }
    }

    /// Floating point view of any numeric value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F32(n) => Some(*n as f64),
            Value::F64(n) => Some(*n),
            other => other.as_i128().map(|n| n as f64),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::I32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::I8(n) => write!(f, "{}", n),
            Value::I16(n) => write!(f, "{}", n),
            Value::I32(n) => write!(f, "{}", n),
            Value::I64(n) => write!(f, "{}", n),
            Value::I128(n) => write!(f, "{}", n),
            Value::F32(n) => write!(f, "{}", n),
            Value::F64(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "'{}'", s),
        }
    }
}

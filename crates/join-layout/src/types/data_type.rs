//! SQL data types carried by slots and expressions

use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL data types known to the tuple layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    // Boolean
    Boolean,
    // Integer types
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    LargeInt,
    // Float types
    Float,
    Double,
    // Decimal with precision and scale
    Decimal(u8, u8),
    // Date/Time types
    Date,
    DateTime,
    // String types
    Varchar(u32),
    String,
    // Type of a bare NULL literal
    Null,
}

impl DataType {
    /// Bytes a slot of this type occupies inside a tuple.
    ///
    /// Variable-length types store a fixed-size reference in the tuple.
    pub fn slot_size(&self) -> usize {
        match self {
            DataType::Boolean | DataType::TinyInt | DataType::Null => 1,
            DataType::SmallInt => 2,
            DataType::Int | DataType::Float | DataType::Date => 4,
            DataType::BigInt | DataType::Double | DataType::DateTime => 8,
            DataType::LargeInt | DataType::Decimal(_, _) => 16,
            DataType::Varchar(_) | DataType::String => 16,
        }
    }

    /// Average serialized width, used for row size statistics
    pub fn avg_serialized_size(&self) -> f64 {
        match self {
            DataType::Varchar(len) => (*len).min(64) as f64,
            DataType::String => 64.0,
            other => other.slot_size() as f64,
        }
    }

    /// The type an arithmetic operation over `self` and `other` produces.
    pub fn wider(&self, other: &DataType) -> DataType {
        fn rank(t: &DataType) -> u8 {
            match t {
                DataType::Null => 0,
                DataType::Boolean => 1,
                DataType::TinyInt => 2,
                DataType::SmallInt => 3,
                DataType::Int => 4,
                DataType::BigInt => 5,
                DataType::LargeInt => 6,
                DataType::Decimal(_, _) => 7,
                DataType::Float => 8,
                DataType::Double => 9,
                _ => 10,
            }
        }
        if rank(self) >= rank(other) { *self } else { *other }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::TinyInt => write!(f, "TINYINT"),
            DataType::SmallInt => write!(f, "SMALLINT"),
            DataType::Int => write!(f, "INT"),
            DataType::BigInt => write!(f, "BIGINT"),
            DataType::LargeInt => write!(f, "LARGEINT"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::Double => write!(f, "DOUBLE"),
            DataType::Decimal(p, s) => write!(f, "DECIMAL({}, {})", p, s),
            DataType::Date => write!(f, "DATE"),
            DataType::DateTime => write!(f, "DATETIME"),
            DataType::Varchar(len) => write!(f, "VARCHAR({})", len),
            DataType::String => write!(f, "STRING"),
            DataType::Null => write!(f, "NULL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_sizes() {
        assert_eq!(DataType::Boolean.slot_size(), 1);
        assert_eq!(DataType::SmallInt.slot_size(), 2);
        assert_eq!(DataType::Int.slot_size(), 4);
        assert_eq!(DataType::BigInt.slot_size(), 8);
        assert_eq!(DataType::Decimal(27, 9).slot_size(), 16);
        assert_eq!(DataType::Varchar(10).slot_size(), 16);
    }

    #[test]
    fn test_wider() {
        assert_eq!(DataType::Int.wider(&DataType::BigInt), DataType::BigInt);
        assert_eq!(DataType::Double.wider(&DataType::Int), DataType::Double);
        assert_eq!(DataType::Null.wider(&DataType::TinyInt), DataType::TinyInt);
    }
}

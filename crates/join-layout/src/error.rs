//! Error types for join layout planning

use crate::catalog::{SlotId, TupleId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Catalog errors
    #[error("Tuple not found: {0}")]
    TupleNotFound(TupleId),

    #[error("Slot not found: {0}")]
    SlotNotFound(SlotId),

    #[error("Tuple {0} has a finalized layout and cannot be modified")]
    LayoutFinalized(TupleId),

    // Substitution map contract errors
    #[error("Substitution map length mismatch: expected {expected}, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("Expected a slot reference, found {0}")]
    NotASlotRef(String),

    #[error("Join node {0} has no source to output map; compute the output tuple first")]
    MissingSourceMap(u32),

    // Evaluation errors
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    // System errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Fails with [`Error::Internal`] when a planner contract does not hold.
pub(crate) fn check_state(condition: bool, message: impl FnOnce() -> String) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(Error::Internal(message()))
    }
}

//! Identifiers for descriptors and plan nodes

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(u32);

        impl $name {
            pub const fn new(id: u32) -> Self {
                Self(id)
            }

            pub const fn as_u32(&self) -> u32 {
                self.0
            }

            pub(crate) fn index(&self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifies a tuple descriptor within one query's descriptor table
    TupleId
);
id_type!(
    /// Identifies a slot descriptor within one query's descriptor table
    SlotId
);
id_type!(
    /// Identifies a node of the plan tree
    PlanNodeId
);

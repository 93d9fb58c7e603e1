//! Join operators and the nullability rules they imply

use crate::types::NullSide;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinOperator {
    Inner,
    Cross,
    LeftOuter,
    RightOuter,
    FullOuter,
    LeftSemi,
    RightSemi,
    LeftAnti,
    RightAnti,
    NullAwareLeftAnti,
}

/// Which sides a join copies into its output row, and which of them are
/// forced nullable there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputRules {
    pub copy_left: bool,
    pub copy_right: bool,
    pub left_nullable: bool,
    pub right_nullable: bool,
}

impl OutputRules {
    pub fn copies(&self, side: NullSide) -> bool {
        match side {
            NullSide::Left => self.copy_left,
            NullSide::Right => self.copy_right,
        }
    }

    pub fn forces_nullable(&self, side: NullSide) -> bool {
        match side {
            NullSide::Left => self.left_nullable,
            NullSide::Right => self.right_nullable,
        }
    }
}

impl JoinOperator {
    pub const ALL: [JoinOperator; 10] = [
        JoinOperator::Inner,
        JoinOperator::Cross,
        JoinOperator::LeftOuter,
        JoinOperator::RightOuter,
        JoinOperator::FullOuter,
        JoinOperator::LeftSemi,
        JoinOperator::RightSemi,
        JoinOperator::LeftAnti,
        JoinOperator::RightAnti,
        JoinOperator::NullAwareLeftAnti,
    ];

    pub fn is_outer_join(&self) -> bool {
        matches!(
            self,
            JoinOperator::LeftOuter | JoinOperator::RightOuter | JoinOperator::FullOuter
        )
    }

    /// Semi and anti joins that return left rows only
    pub fn is_left_semi_or_anti(&self) -> bool {
        matches!(
            self,
            JoinOperator::LeftSemi | JoinOperator::LeftAnti | JoinOperator::NullAwareLeftAnti
        )
    }

    /// Semi and anti joins that return right rows only
    pub fn is_right_semi_or_anti(&self) -> bool {
        matches!(self, JoinOperator::RightSemi | JoinOperator::RightAnti)
    }

    pub fn is_semi_or_anti(&self) -> bool {
        self.is_left_semi_or_anti() || self.is_right_semi_or_anti()
    }

    pub fn output_rules(&self) -> OutputRules {
        let (copy_left, copy_right, left_nullable, right_nullable) = match self {
            JoinOperator::Inner | JoinOperator::Cross => (true, true, false, false),
            JoinOperator::LeftOuter => (true, true, false, true),
            JoinOperator::RightOuter => (true, true, true, false),
            JoinOperator::FullOuter => (true, true, true, true),
            JoinOperator::LeftSemi | JoinOperator::LeftAnti | JoinOperator::NullAwareLeftAnti => {
                (true, false, false, false)
            }
            JoinOperator::RightSemi | JoinOperator::RightAnti => (false, true, false, false),
        };
        OutputRules {
            copy_left,
            copy_right,
            left_nullable,
            right_nullable,
        }
    }

    /// Nullability of the intermediate (left, right) tuples.
    ///
    /// The intermediate row is assembled after the probe, so the NULL-padded
    /// side is the same as in the output row.
    pub fn intermediate_nullable(&self) -> (bool, bool) {
        match self {
            JoinOperator::LeftOuter => (false, true),
            JoinOperator::RightOuter => (true, false),
            JoinOperator::FullOuter => (true, true),
            _ => (false, false),
        }
    }

    /// The sides whose rows may be missing from a joined row
    pub fn null_sides(&self) -> Vec<NullSide> {
        let rules = self.output_rules();
        [NullSide::Left, NullSide::Right]
            .into_iter()
            .filter(|side| rules.forces_nullable(*side))
            .collect()
    }
}

impl fmt::Display for JoinOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JoinOperator::Inner => "INNER JOIN",
            JoinOperator::Cross => "CROSS JOIN",
            JoinOperator::LeftOuter => "LEFT OUTER JOIN",
            JoinOperator::RightOuter => "RIGHT OUTER JOIN",
            JoinOperator::FullOuter => "FULL OUTER JOIN",
            JoinOperator::LeftSemi => "LEFT SEMI JOIN",
            JoinOperator::RightSemi => "RIGHT SEMI JOIN",
            JoinOperator::LeftAnti => "LEFT ANTI JOIN",
            JoinOperator::RightAnti => "RIGHT ANTI JOIN",
            JoinOperator::NullAwareLeftAnti => "NULL AWARE LEFT ANTI JOIN",
        };
        write!(f, "{}", name)
    }
}

//! Join layout configuration

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Knobs controlling how a join node lays out and rewrites its tuples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Guard columns of an outer-joined inline view with a tuple-is-null check
    /// so the whole view row reads as NULL when the join found no match.
    pub wrap_null_side_inline_views: bool,

    /// Keep the declared type of output expressions when they are rewritten
    /// against the intermediate tuples.
    pub preserve_projection_types: bool,

    /// Allow the join algorithm to skip the intermediate copy of a side that
    /// semi/anti joins never read after the probe.
    pub prune_unused_intermediate_sides: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            wrap_null_side_inline_views: true,
            preserve_projection_types: true,
            prune_unused_intermediate_sides: true,
        }
    }
}

impl LayoutConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Enable or disable NULL-side wrapping of inline views
    pub fn with_null_side_wrapping(mut self, enabled: bool) -> Self {
        self.wrap_null_side_inline_views = enabled;
        self
    }

    /// Enable or disable type preservation for rewritten output expressions
    pub fn with_type_preservation(mut self, enabled: bool) -> Self {
        self.preserve_projection_types = enabled;
        self
    }

    /// Enable or disable pruning of unread intermediate sides
    pub fn with_side_pruning(mut self, enabled: bool) -> Self {
        self.prune_unused_intermediate_sides = enabled;
        self
    }
}

//! Evaluation limits.

use serde::{Deserialize, Serialize};

use super::range::MAX_RANGE_CELLS;

pub const DEFAULT_MAX_DEPTH: usize = 256;
/// Function calls nested inside one another's arguments, as in Excel.
pub const DEFAULT_MAX_NESTING: usize = 64;

/// Limits applied to a single evaluation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Deepest chain of formula cells resolved before `#REF_DEPTH_EXCEEDED!`.
    pub max_depth: usize,
    /// Deepest nesting of calls inside call arguments.
    pub max_nesting: usize,
    /// Largest number of cells a single range argument may expand to.
    pub max_range_cells: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_depth: DEFAULT_MAX_DEPTH,
            max_nesting: DEFAULT_MAX_NESTING,
            max_range_cells: MAX_RANGE_CELLS,
        }
    }
}

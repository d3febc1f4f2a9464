use sheetcalc_engine::engine::{EngineConfig, Evaluator, Grid};

use super::graph::DependencyGraph;

/// UI-agnostic document state for the spreadsheet.
pub struct Document {
    /// The spreadsheet grid
    pub grid: Grid,
    /// Dependency edges between cells, kept in step with the grid
    pub graph: DependencyGraph,
    /// Limits handed to every evaluation
    pub config: EngineConfig,
    /// Whether the grid has been modified
    pub modified: bool,
}

impl Document {
    /// Create an empty document with default engine limits.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Document {
            grid: Grid::new(),
            graph: DependencyGraph::new(),
            config,
            modified: false,
        }
    }

    pub(crate) fn evaluator(&self) -> Evaluator<'_, Grid> {
        Evaluator::with_config(&self.grid, self.config.clone())
    }

    /// Rebuild the dependency graph from the grid.
    /// Call this after the grid was replaced wholesale.
    pub fn rebuild_dependents(&mut self) {
        self.graph.clear();
        for entry in self.grid.iter() {
            if !entry.depends_on.is_empty() {
                self.graph
                    .set_dependencies(entry.key(), entry.depends_on.iter().cloned());
            }
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

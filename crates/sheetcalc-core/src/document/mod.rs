//! Document state and logic (UI-agnostic).

mod graph;
mod ops;
mod state;

pub use graph::DependencyGraph;
pub use ops::Recalc;
pub use state::Document;

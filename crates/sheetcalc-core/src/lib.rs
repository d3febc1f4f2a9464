//! sheetcalc-core - UI-agnostic document model.

pub mod document;
pub mod error;

pub use document::{DependencyGraph, Document, Recalc};
pub use error::{CoreError, Result};

pub use sheetcalc_engine::engine::CellRef;

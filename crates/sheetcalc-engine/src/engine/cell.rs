//! Cell data structures and the cell store boundary.
//!
//! - [`CellType`] - Classified cell content (empty, text, number, or formula)
//! - [`Cell`] - A cell record: raw input, dependencies, cached evaluation state
//! - [`Grid`] - Thread-safe sparse storage for cells (backed by `DashMap`)
//! - [`CellStore`] - Read access the evaluator needs from whoever owns the cells

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::cell_ref::CellRef;
use super::deps::extract_dependencies;
use super::value::{Value, coerce_number};

/// The type of content stored in a cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CellType {
    Empty,
    Text(String),
    Number(f64),
    /// Full formula text, including the leading `=`.
    Formula(String),
}

impl CellType {
    /// Classify raw input.
    /// - Empty string or whitespace -> Empty
    /// - Starts with '=' -> Formula
    /// - Plain decimal number -> Number
    /// - Otherwise -> Text, kept verbatim
    pub fn from_input(input: &str) -> CellType {
        if input.trim().is_empty() {
            CellType::Empty
        } else if input.starts_with('=') {
            CellType::Formula(input.to_string())
        } else if let Some(n) = coerce_number(input) {
            CellType::Number(n)
        } else {
            CellType::Text(input.to_string())
        }
    }

    /// Value of literal content; formulas have no literal value.
    pub fn literal_value(&self) -> Option<Value> {
        match self {
            CellType::Empty => Some(Value::Empty),
            CellType::Text(s) => Some(Value::Text(s.clone())),
            CellType::Number(n) => Some(Value::Number(*n)),
            CellType::Formula(_) => None,
        }
    }
}

/// Display metadata carried with a cell. The engine never reads it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellFormat {
    pub bold: bool,
    pub italic: bool,
    pub font_size: Option<u16>,
    pub color: Option<String>,
}

/// A cell in the spreadsheet grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Exactly what the user typed.
    pub input: String,
    pub contents: CellType,
    pub depends_on: Vec<CellRef>,
    pub dirty: bool,
    /// Last computed value for formula cells (not serialized).
    #[serde(skip)]
    pub cached_value: Option<Value>,
    #[serde(default)]
    pub format: CellFormat,
}

impl Cell {
    /// Parse user input into a cell. Formula dependencies are extracted
    /// eagerly; formula cells start dirty.
    pub fn from_input(input: &str) -> Cell {
        let contents = CellType::from_input(input);
        let (depends_on, dirty) = match &contents {
            CellType::Formula(formula) => (extract_dependencies(formula), true),
            _ => (Vec::new(), false),
        };
        Cell {
            input: input.to_string(),
            contents,
            depends_on,
            dirty,
            cached_value: None,
            format: CellFormat::default(),
        }
    }

    pub fn is_formula(&self) -> bool {
        matches!(self.contents, CellType::Formula(_))
    }

    /// Current value: the literal, or the cached result of a formula.
    pub fn value(&self) -> Value {
        self.contents
            .literal_value()
            .or_else(|| self.cached_value.clone())
            .unwrap_or_default()
    }

    /// A clean cached result, if one is available.
    pub fn fresh_value(&self) -> Option<Value> {
        if self.is_formula() && !self.dirty {
            self.cached_value.clone()
        } else {
            None
        }
    }
}

/// Thread-safe sparse grid storage. Writes to one key are serialized by the map.
pub type Grid = DashMap<CellRef, Cell>;

/// Read access to cells, as seen by the evaluator.
///
/// Absent cells are implicit empties, never errors.
pub trait CellStore {
    /// Raw input of a cell, or None when nothing is stored there.
    fn raw_input(&self, cell_ref: &CellRef) -> Option<String>;

    /// A cached value the store guarantees is up to date. The evaluator uses
    /// it instead of re-evaluating the cell's formula.
    fn cached_value(&self, _cell_ref: &CellRef) -> Option<Value> {
        None
    }

    /// Direct dependencies of a cell.
    fn dependencies(&self, cell_ref: &CellRef) -> Vec<CellRef> {
        match self.raw_input(cell_ref) {
            Some(input) if input.starts_with('=') => extract_dependencies(&input),
            _ => Vec::new(),
        }
    }
}

impl CellStore for Grid {
    fn raw_input(&self, cell_ref: &CellRef) -> Option<String> {
        self.get(cell_ref).map(|cell| cell.input.clone())
    }

    fn cached_value(&self, cell_ref: &CellRef) -> Option<Value> {
        self.get(cell_ref).and_then(|cell| cell.fresh_value())
    }

    fn dependencies(&self, cell_ref: &CellRef) -> Vec<CellRef> {
        self.get(cell_ref)
            .map(|cell| cell.depends_on.clone())
            .unwrap_or_default()
    }
}

impl CellStore for HashMap<CellRef, Cell> {
    fn raw_input(&self, cell_ref: &CellRef) -> Option<String> {
        self.get(cell_ref).map(|cell| cell.input.clone())
    }

    fn cached_value(&self, cell_ref: &CellRef) -> Option<Value> {
        self.get(cell_ref).and_then(Cell::fresh_value)
    }

    fn dependencies(&self, cell_ref: &CellRef) -> Vec<CellRef> {
        self.get(cell_ref)
            .map(|cell| cell.depends_on.clone())
            .unwrap_or_default()
    }
}

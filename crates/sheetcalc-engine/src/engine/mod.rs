//! Spreadsheet engine API.

mod arith;
mod cell;
mod cell_ref;
mod config;
mod cycle;
mod deps;
mod error;
mod eval;
mod format;
mod parse;
mod range;
mod value;

pub use cell::{Cell, CellFormat, CellStore, CellType, Grid};
pub use cell_ref::{CellRef, canonicalize, col_to_letters, decode, encode, letters_to_col};
pub use config::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_NESTING, EngineConfig};
pub use cycle::{detect_cycle, find_cycle};
pub use deps::extract_dependencies;
pub use error::{ErrorKind, ParseError};
pub use eval::{EvalState, Evaluator, ResolutionStack};
pub use format::{format_number, format_value};
pub use parse::{Arg, Formula, parse, split_args};
pub use range::{MAX_RANGE_CELLS, RangeRect, expand, expand_with_limit};
pub use value::{Value, coerce_number};

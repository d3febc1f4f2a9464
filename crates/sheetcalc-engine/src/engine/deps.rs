//! Dependency extraction from formula strings.
//!
//! Finds every cell reference a formula depends on. This is used to build the
//! dependency graph for recalculation and cycle detection.
//!
//! Handles:
//! - Simple cell references: `A1`, `B2`
//! - Range arguments: `SUM(A1:B5)`, expanded cell by cell
//! - Nested calls and arithmetic: `SUM(MAX(A1,B1), C1 * 2)`
//! - Ignores quoted literals
//!
//! Calls nested deeper than [`DEFAULT_MAX_NESTING`] are not descended into;
//! evaluation rejects them anyway.

use super::cell_ref::{CellRef, embedded_ref_re};
use super::config::DEFAULT_MAX_NESTING;
use super::parse::{Arg, Formula, parse};
use super::range::{MAX_RANGE_CELLS, expand_with_limit};

/// Extract all cell references from a formula (with its leading `=`).
/// Unparseable formulas have no dependencies.
pub fn extract_dependencies(formula: &str) -> Vec<CellRef> {
    let mut deps = Vec::new();
    if let Ok(parsed) = parse(formula) {
        collect(&parsed, 0, &mut deps);
    }
    deps
}

fn collect(formula: &Formula, nesting: usize, deps: &mut Vec<CellRef>) {
    match formula {
        Formula::Reference(cell_ref) => deps.push(cell_ref.clone()),
        Formula::Arithmetic(expr) => collect_embedded(expr, deps),
        Formula::Call { args, .. } => {
            for arg in args {
                match arg {
                    Arg::Reference(cell_ref) => deps.push(cell_ref.clone()),
                    // Oversized ranges are skipped; evaluation reports them.
                    Arg::Range(spec) => {
                        if let Ok(cells) = expand_with_limit(spec, MAX_RANGE_CELLS) {
                            deps.extend(cells);
                        }
                    }
                    Arg::Expr(_) if nesting >= DEFAULT_MAX_NESTING => {}
                    Arg::Expr(expr) => match parse(&format!("={expr}")) {
                        Ok(nested) => collect(&nested, nesting + 1, deps),
                        Err(_) => collect_embedded(expr, deps),
                    },
                    Arg::Text(_) | Arg::Number(_) => {}
                }
            }
        }
    }
}

fn collect_embedded(expr: &str, deps: &mut Vec<CellRef>) {
    for m in embedded_ref_re().find_iter(expr) {
        if let Some(cell_ref) = CellRef::parse(m.as_str()) {
            deps.push(cell_ref);
        }
    }
}

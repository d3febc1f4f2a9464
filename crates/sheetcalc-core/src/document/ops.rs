use super::Document;
use std::collections::HashSet;
use crate::error::{CoreError, Result};
use sheetcalc_engine::builtins::DuplicateRows;
use sheetcalc_engine::engine::{
    Cell, CellFormat, CellRef, CellType, ErrorKind, RangeRect, Value, detect_cycle, encode,
    expand_with_limit, find_cycle, format_value,
};
use tracing::{debug, info, warn};

/// What a write caused.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Recalc {
    /// Formula cells whose cached value was recomputed, in evaluation order.
    pub recomputed: Vec<CellRef>,
    /// A dependency cycle reachable from the written cell, if the write left one.
    pub cycle: Option<Vec<CellRef>>,
}

impl Recalc {
    fn merge(&mut self, other: Recalc) {
        self.recomputed.extend(other.recomputed);
        if self.cycle.is_none() {
            self.cycle = other.cycle;
        }
    }
}

fn cycle_text(path: &[CellRef]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Cells on the loop of a cycle path. The path may begin outside the loop.
fn cycle_members(path: &[CellRef]) -> HashSet<CellRef> {
    let Some((closing, walked)) = path.split_last() else {
        return HashSet::new();
    };
    let from = walked.iter().position(|cell| cell == closing).unwrap_or(0);
    walked[from..].iter().cloned().collect()
}

/// `"` inside a formula string literal is written `""`.
fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

impl Document {
    fn check_ref(cell_ref: &CellRef) -> Result<()> {
        encode(cell_ref.col, cell_ref.row)
            .map(|_| ())
            .map_err(|_| CoreError::InvalidReference(format!("{cell_ref:?}")))
    }

    fn parse_ref(name: &str) -> Result<CellRef> {
        CellRef::parse(name.trim()).ok_or_else(|| CoreError::InvalidReference(name.to_string()))
    }

    /// Re-evaluate the changed cells and everything downstream of them,
    /// dependencies first.
    ///
    /// Cells on `cycle` are settled as `#CIRCULAR_REF!` up front, so
    /// everything reading them sees the error without walking the loop.
    fn recompute_from(&self, changed: &[CellRef], cycle: Option<&[CellRef]>) -> Vec<CellRef> {
        let order = self.graph.recalc_order(changed);
        let cyclic = cycle.map(cycle_members).unwrap_or_default();

        // Invalidate the whole affected set before evaluating any of it, so
        // nothing reads a stale cache.
        for cell_ref in order.iter().chain(&cyclic) {
            if let Some(mut cell) = self.grid.get_mut(cell_ref)
                && cell.is_formula()
            {
                if cyclic.contains(cell_ref) {
                    cell.cached_value = Some(Value::Error(ErrorKind::CircularReference));
                    cell.dirty = false;
                } else {
                    cell.dirty = true;
                    cell.cached_value = None;
                }
            }
        }

        let evaluator = self.evaluator();
        let mut recomputed = Vec::new();
        for cell_ref in order {
            let is_formula = self.grid.get(&cell_ref).is_some_and(|cell| cell.is_formula());
            if !is_formula {
                continue;
            }
            if cyclic.contains(&cell_ref) {
                recomputed.push(cell_ref);
                continue;
            }
            let value = evaluator.evaluate_cell(&cell_ref);
            if let Some(mut cell) = self.grid.get_mut(&cell_ref) {
                cell.cached_value = Some(value);
                cell.dirty = false;
            }
            recomputed.push(cell_ref);
        }

        debug!(changed = changed.len(), recomputed = recomputed.len(), "recalculated");
        recomputed
    }

    /// Set cell contents from input string.
    ///
    /// Empty input clears the cell. A write that closes a dependency cycle is
    /// kept: the cells on the cycle evaluate to `#CIRCULAR_REF!` and the cycle
    /// is reported in the returned [`Recalc`].
    pub fn set_cell_from_input(&mut self, cell_ref: CellRef, input: &str) -> Result<Recalc> {
        Self::check_ref(&cell_ref)?;
        let mut cell = Cell::from_input(input);
        if cell.contents == CellType::Empty {
            return Ok(self.clear_cell(&cell_ref));
        }

        if let Some(old) = self.grid.get(&cell_ref) {
            cell.format = old.format.clone();
        }
        self.graph
            .set_dependencies(&cell_ref, cell.depends_on.iter().cloned());
        self.grid.insert(cell_ref.clone(), cell);
        self.modified = true;

        let cycle = detect_cycle(&cell_ref, &self.grid);
        if let Some(path) = &cycle {
            warn!(cell = %cell_ref, cycle = %cycle_text(path), "circular dependency");
        }

        let recomputed = self.recompute_from(std::slice::from_ref(&cell_ref), cycle.as_deref());
        Ok(Recalc { recomputed, cycle })
    }

    /// Set a cell addressed by name (`"B7"`).
    pub fn set_cell(&mut self, name: &str, input: &str) -> Result<Recalc> {
        let cell_ref = Self::parse_ref(name)?;
        self.set_cell_from_input(cell_ref, input)
    }

    /// Clear the specified cell.
    pub fn clear_cell(&mut self, cell_ref: &CellRef) -> Recalc {
        if self.grid.remove(cell_ref).is_none() {
            return Recalc::default();
        }
        self.graph.clear_dependencies(cell_ref);
        self.modified = true;
        Recalc {
            recomputed: self.recompute_from(std::slice::from_ref(cell_ref), None),
            cycle: None,
        }
    }

    /// Replace the formatting metadata of an existing cell.
    /// Returns false when nothing is stored at `cell_ref`.
    pub fn set_cell_format(&mut self, cell_ref: &CellRef, format: CellFormat) -> bool {
        match self.grid.get_mut(cell_ref) {
            Some(mut cell) => {
                cell.format = format;
                self.modified = true;
                true
            }
            None => false,
        }
    }

    /// Write many cells at once, then recalculate the whole document once.
    pub fn load_cells<I, S>(&mut self, cells: I) -> Result<Recalc>
    where
        I: IntoIterator<Item = (CellRef, S)>,
        S: AsRef<str>,
    {
        for (cell_ref, input) in cells {
            Self::check_ref(&cell_ref)?;
            let cell = Cell::from_input(input.as_ref());
            if cell.contents == CellType::Empty {
                self.grid.remove(&cell_ref);
            } else {
                self.grid.insert(cell_ref, cell);
            }
            self.modified = true;
        }
        Ok(self.recalculate_all())
    }

    /// Rebuild the dependency graph and recompute every formula cell.
    pub fn recalculate_all(&mut self) -> Recalc {
        self.rebuild_dependents();

        let roots = self.cell_refs();
        let formulas = roots
            .iter()
            .filter(|cell_ref| self.grid.get(*cell_ref).is_some_and(|cell| cell.is_formula()))
            .cloned();
        let cycle = find_cycle(formulas, &self.grid);
        if let Some(path) = &cycle {
            warn!(cycle = %cycle_text(path), "circular dependency");
        }

        let recomputed = self.recompute_from(&roots, cycle.as_deref());
        info!(cells = roots.len(), formulas = recomputed.len(), "document recalculated");
        Recalc { recomputed, cycle }
    }

    /// Computed value of a cell. Absent cells are empty.
    pub fn get_cell_value(&self, cell_ref: &CellRef) -> Value {
        let cached = match self.grid.get(cell_ref) {
            None => return Value::Empty,
            Some(cell) if !cell.is_formula() => return Cell::value(&cell),
            Some(cell) => cell.fresh_value(),
        };
        cached.unwrap_or_else(|| self.evaluator().evaluate_cell(cell_ref))
    }

    /// Displayed text of a cell.
    pub fn get_cell_display(&self, cell_ref: &CellRef) -> String {
        format_value(&self.get_cell_value(cell_ref))
    }

    /// What was typed into a cell.
    pub fn get_cell_input(&self, cell_ref: &CellRef) -> Option<String> {
        self.grid.get(cell_ref).map(|cell| cell.input.clone())
    }

    /// Every stored cell, row-major.
    pub fn cell_refs(&self) -> Vec<CellRef> {
        let mut refs: Vec<CellRef> = self.grid.iter().map(|entry| entry.key().clone()).collect();
        refs.sort();
        refs
    }

    /// Evaluate a formula against the document without writing it anywhere.
    pub fn evaluate(&self, formula: &str) -> Value {
        self.evaluator().evaluate(formula)
    }

    /// Write the same formula to every cell of `targets` (a range or list).
    /// A missing leading `=` is added.
    pub fn apply_formula(&mut self, targets: &str, formula: &str) -> Result<Recalc> {
        let cells = expand_with_limit(targets, self.config.max_range_cells)
            .map_err(|_| CoreError::InvalidRange(targets.to_string()))?;
        let formula = formula.trim();
        let formula = if formula.starts_with('=') {
            formula.to_string()
        } else {
            format!("={formula}")
        };

        let mut recalc = Recalc::default();
        for cell_ref in cells {
            recalc.merge(self.set_cell_from_input(cell_ref, &formula)?);
        }
        Ok(recalc)
    }

    /// Replace `find` with `replace` in the displayed value of a cell and
    /// store the result as the cell's new literal input.
    ///
    /// Returns None when nothing changed: the cell is absent, `find` is
    /// empty, or the cell's value is an error.
    pub fn find_and_replace(
        &mut self,
        cell_ref: &CellRef,
        find: &str,
        replace: &str,
    ) -> Result<Option<Recalc>> {
        if find.is_empty() || self.grid.get(cell_ref).is_none() {
            return Ok(None);
        }
        let formula = format!(
            "=FIND_AND_REPLACE({cell_ref},{},{})",
            quote(find),
            quote(replace)
        );
        match self.evaluate(&formula) {
            Value::Text(text) => self.set_cell_from_input(cell_ref.clone(), &text).map(Some),
            other => {
                debug!(cell = %cell_ref, result = %other, "find and replace skipped");
                Ok(None)
            }
        }
    }

    /// Clear every row of `range` that repeats an earlier row of the range.
    /// Only the cells inside the range are cleared; nothing shifts.
    pub fn remove_duplicate_rows(&mut self, range: &str) -> Result<DuplicateRows> {
        let invalid = || CoreError::InvalidRange(range.to_string());
        let rect = RangeRect::parse(range).map_err(|_| invalid())?;
        let report = self.evaluator().duplicate_rows(range).map_err(|_| invalid())?;

        let mut cleared = Vec::new();
        for &row in &report.duplicate_rows {
            for col in rect.start.col..=rect.end.col {
                let cell_ref = CellRef::new(col, row);
                if self.grid.remove(&cell_ref).is_some() {
                    self.graph.clear_dependencies(&cell_ref);
                    cleared.push(cell_ref);
                }
            }
        }

        if !cleared.is_empty() {
            self.modified = true;
            self.recompute_from(&cleared, None);
        }
        info!(
            range,
            analyzed = report.analyzed_rows,
            removed = report.duplicate_rows.len(),
            "duplicate rows removed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::{Document, Recalc};
    use crate::error::CoreError;
    use sheetcalc_engine::engine::{CellFormat, CellRef, EngineConfig, ErrorKind, Value};

    fn r(name: &str) -> CellRef {
        CellRef::parse(name).unwrap()
    }

    #[test]
    fn test_set_cell_computes_value() {
        let mut core = Document::new();
        core.set_cell("A1", "10").unwrap();
        core.set_cell("A2", "20").unwrap();
        let recalc = core.set_cell("A3", "=SUM(A1:A2)").unwrap();
        assert_eq!(recalc.recomputed, [r("A3")]);
        assert!(recalc.cycle.is_none());
        assert_eq!(core.get_cell_value(&r("A3")), Value::Number(30.0));
        assert!(!core.grid.get(&r("A3")).unwrap().dirty);
        assert!(core.modified);
    }

    #[test]
    fn test_dependents_refresh_on_write() {
        let mut core = Document::new();
        core.set_cell("A1", "1").unwrap();
        core.set_cell("B1", "=A1 * 10").unwrap();
        core.set_cell("C1", "=B1 + 1").unwrap();
        assert_eq!(core.get_cell_display(&r("C1")), "11");

        let recalc = core.set_cell("A1", "2").unwrap();
        assert_eq!(recalc.recomputed, [r("B1"), r("C1")]);
        assert_eq!(core.get_cell_display(&r("B1")), "20");
        assert_eq!(core.get_cell_display(&r("C1")), "21");
    }

    #[test]
    fn test_formula_before_its_inputs() {
        let mut core = Document::new();
        core.set_cell("B1", "=A1 + A2").unwrap();
        assert_eq!(core.get_cell_value(&r("B1")), Value::Number(0.0));
        core.set_cell("A2", "5").unwrap();
        assert_eq!(core.get_cell_value(&r("B1")), Value::Number(5.0));
    }

    #[test]
    fn test_circular_write_is_reported() {
        let mut core = Document::new();
        core.set_cell("A1", "=B1").unwrap();
        let recalc = core.set_cell("B1", "=A1").unwrap();
        assert!(recalc.cycle.is_some());
        assert_eq!(core.get_cell_display(&r("A1")), "#CIRCULAR_REF!");
        assert_eq!(core.get_cell_display(&r("B1")), "#CIRCULAR_REF!");

        // Breaking the cycle heals both cells.
        let recalc = core.set_cell("B1", "7").unwrap();
        assert!(recalc.cycle.is_none());
        assert_eq!(core.get_cell_value(&r("A1")), Value::Number(7.0));
    }

    #[test]
    fn test_self_reference() {
        let mut core = Document::new();
        let recalc = core.set_cell("A1", "=A1 + 1").unwrap();
        assert_eq!(recalc.cycle, Some(vec![r("A1"), r("A1")]));
        assert_eq!(
            core.get_cell_value(&r("A1")),
            Value::Error(ErrorKind::CircularReference)
        );
    }

    #[test]
    fn test_clear_cell_refreshes_dependents() {
        let mut core = Document::new();
        core.set_cell("A1", "4").unwrap();
        core.set_cell("B1", "=A1 * 2").unwrap();
        let recalc = core.clear_cell(&r("A1"));
        assert_eq!(recalc.recomputed, [r("B1")]);
        assert_eq!(core.get_cell_value(&r("B1")), Value::Number(0.0));
        assert_eq!(core.clear_cell(&r("Z9")), Recalc::default());

        core.set_cell("B1", "").unwrap();
        assert!(core.get_cell_input(&r("B1")).is_none());
    }

    #[test]
    fn test_invalid_references_are_rejected() {
        let mut core = Document::new();
        assert!(matches!(
            core.set_cell("A0", "1"),
            Err(CoreError::InvalidReference(_))
        ));
        assert!(matches!(
            core.set_cell_from_input(CellRef::new(0, 3), "1"),
            Err(CoreError::InvalidReference(_))
        ));
        assert!(core.cell_refs().is_empty());
    }

    #[test]
    fn test_cell_refs_are_row_major_and_input_is_kept() {
        let mut core = Document::new();
        core.set_cell("B2", "  padded ").unwrap();
        core.set_cell("C1", "x").unwrap();
        core.set_cell("A2", "=C1").unwrap();
        assert_eq!(core.cell_refs(), [r("C1"), r("A2"), r("B2")]);
        assert_eq!(core.get_cell_input(&r("B2")).as_deref(), Some("  padded "));
        assert_eq!(core.get_cell_input(&r("A2")).as_deref(), Some("=C1"));
    }

    #[test]
    fn test_evaluate_does_not_write() {
        let mut core = Document::new();
        core.set_cell("A1", "3").unwrap();
        core.modified = false;
        assert_eq!(core.evaluate("=A1 * A1"), Value::Number(9.0));
        assert_eq!(core.evaluate("=A1 +"), Value::Error(ErrorKind::Parse));
        assert!(!core.modified);
        assert_eq!(core.cell_refs().len(), 1);
    }

    #[test]
    fn test_apply_formula_to_range() {
        let mut core = Document::new();
        core.set_cell("A1", "2").unwrap();
        let recalc = core.apply_formula("B1:B3", "A1 * 3").unwrap();
        assert_eq!(recalc.recomputed.len(), 3);
        for name in ["B1", "B2", "B3"] {
            assert_eq!(core.get_cell_input(&r(name)).as_deref(), Some("=A1 * 3"));
            assert_eq!(core.get_cell_value(&r(name)), Value::Number(6.0));
        }
        assert!(matches!(
            core.apply_formula("B1:", "=1"),
            Err(CoreError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_find_and_replace_writes_literal() {
        let mut core = Document::new();
        core.set_cell("A1", "hello world").unwrap();
        core.set_cell("B1", "=UPPER(A1)").unwrap();

        let recalc = core.find_and_replace(&r("A1"), "world", "there").unwrap();
        assert!(recalc.is_some());
        assert_eq!(core.get_cell_input(&r("A1")).as_deref(), Some("hello there"));
        assert_eq!(core.get_cell_display(&r("B1")), "HELLO THERE");

        assert!(core.find_and_replace(&r("Z1"), "a", "b").unwrap().is_none());
        assert!(core.find_and_replace(&r("A1"), "", "b").unwrap().is_none());
    }

    #[test]
    fn test_find_and_replace_with_quotes() {
        let mut core = Document::new();
        core.set_cell("A1", r#"say "hi""#).unwrap();
        core.find_and_replace(&r("A1"), r#""hi""#, "'yo'").unwrap();
        assert_eq!(core.get_cell_input(&r("A1")).as_deref(), Some("say 'yo'"));
    }

    #[test]
    fn test_find_and_replace_on_formula_stores_its_value() {
        let mut core = Document::new();
        core.set_cell("A1", "=1200 + 34").unwrap();
        core.find_and_replace(&r("A1"), "2", "9").unwrap();
        assert_eq!(core.get_cell_input(&r("A1")).as_deref(), Some("1934"));
        assert_eq!(core.get_cell_value(&r("A1")), Value::Number(1934.0));
    }

    #[test]
    fn test_remove_duplicate_rows_clears_repeats_only() {
        let mut core = Document::new();
        for (name, input) in [
            ("A1", "x"),
            ("B1", "y"),
            ("A2", "x"),
            ("B2", "y"),
            ("A3", "p"),
            ("B3", "q"),
            ("C2", "outside"),
            ("D1", "=COUNT(A1:B3)"),
            ("E1", "=A2"),
        ] {
            core.set_cell(name, input).unwrap();
        }

        let report = core.remove_duplicate_rows("A1:B3").unwrap();
        assert_eq!(report.analyzed_rows, 3);
        assert_eq!(report.duplicate_rows, [2]);
        assert_eq!(report.retained_rows, [1, 3]);

        assert!(core.get_cell_input(&r("A2")).is_none());
        assert!(core.get_cell_input(&r("B2")).is_none());
        assert_eq!(core.get_cell_input(&r("C2")).as_deref(), Some("outside"));
        assert_eq!(core.get_cell_display(&r("A1")), "x");
        assert_eq!(core.get_cell_display(&r("A3")), "p");
        assert_eq!(core.get_cell_value(&r("E1")), Value::Empty);

        assert!(matches!(
            core.remove_duplicate_rows("nope"),
            Err(CoreError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_load_cells_recalculates_once() {
        let mut core = Document::new();
        let recalc = core
            .load_cells([
                (r("C1"), "=B1 + 1"),
                (r("B1"), "=A1 * 2"),
                (r("A1"), "5"),
            ])
            .unwrap();
        assert_eq!(recalc.recomputed, [r("B1"), r("C1")]);
        assert_eq!(core.get_cell_value(&r("C1")), Value::Number(11.0));
        assert_eq!(core.graph.dependents_of(&r("A1")), [r("B1")]);
    }

    #[test]
    fn test_load_cells_reports_cycles() {
        let mut core = Document::new();
        let recalc = core.load_cells([(r("A1"), "=B1"), (r("B1"), "=A1")]).unwrap();
        assert!(recalc.cycle.is_some());
        assert_eq!(core.get_cell_display(&r("A1")), "#CIRCULAR_REF!");
    }

    #[test]
    fn test_depth_limit_from_config() {
        let config = EngineConfig {
            max_depth: 1,
            ..EngineConfig::default()
        };
        let mut core = Document::with_config(config);
        core.set_cell("A1", "1").unwrap();
        core.set_cell("A2", "=A1").unwrap();
        core.set_cell("A3", "=A2").unwrap();
        assert_eq!(core.get_cell_value(&r("A2")), Value::Number(1.0));
        assert_eq!(core.get_cell_value(&r("A3")), Value::Number(1.0));
        // Previewing an uncached chain walks it in full.
        core.grid.get_mut(&r("A2")).unwrap().dirty = true;
        core.grid.get_mut(&r("A3")).unwrap().dirty = true;
        assert_eq!(core.evaluate("=A2"), Value::Number(1.0));
        assert_eq!(
            core.evaluate("=A3"),
            Value::Error(ErrorKind::DepthExceeded)
        );
    }

    #[test]
    fn test_literal_values_read_through_grid() {
        let mut core = Document::new();
        core.set_cell("A1", "42").unwrap();
        core.set_cell("B1", "text").unwrap();
        assert_eq!(core.get_cell_value(&r("A1")), Value::Number(42.0));
        assert_eq!(core.get_cell_value(&r("B1")), Value::from("text"));
        assert_eq!(core.get_cell_value(&r("C1")), Value::Empty);
    }

    fn chain(len: usize) -> Vec<(CellRef, String)> {
        let mut cells: Vec<(CellRef, String)> = (1..=len)
            .map(|row| (CellRef::new(1, row), format!("=A{}", row + 1)))
            .collect();
        cells.push((CellRef::new(1, len + 1), "7".to_string()));
        cells
    }

    #[test]
    fn test_load_cells_long_chain() {
        let len = 100_000;
        let mut core = Document::new();
        let recalc = core.load_cells(chain(len)).unwrap();
        assert!(recalc.cycle.is_none());
        assert_eq!(recalc.recomputed.len(), len);
        assert_eq!(core.get_cell_value(&r("A1")), Value::Number(7.0));

        let recalc = core.set_cell_from_input(CellRef::new(1, len + 1), "8").unwrap();
        assert_eq!(recalc.recomputed.len(), len);
        assert_eq!(core.get_cell_value(&r("A1")), Value::Number(8.0));

        let recalc = core.set_cell_from_input(CellRef::new(1, len), "=A1").unwrap();
        assert_eq!(recalc.cycle.map(|path| path.len()), Some(len + 1));
        assert_eq!(core.get_cell_display(&r("A1")), "#CIRCULAR_REF!");
    }

    #[test]
    fn test_deeply_nested_formula_is_stored() {
        let mut core = Document::new();
        let levels = 5_000;
        let formula = format!("={}1{}", "SUM(".repeat(levels), ")".repeat(levels));
        core.set_cell("A1", &formula).unwrap();
        assert_eq!(
            core.get_cell_value(&r("A1")),
            Value::Error(ErrorKind::DepthExceeded)
        );
        assert_eq!(core.get_cell_input(&r("A1")), Some(formula));
    }

    #[test]
    fn test_format_is_kept_across_edits() {
        let mut core = Document::new();
        core.set_cell("A1", "1").unwrap();
        let format = CellFormat {
            bold: true,
            color: Some("#ff0000".into()),
            ..CellFormat::default()
        };
        assert!(core.set_cell_format(&r("A1"), format.clone()));
        core.set_cell("A1", "2").unwrap();
        assert_eq!(core.grid.get(&r("A1")).unwrap().format, format);
        assert!(!core.set_cell_format(&r("Z1"), format));
    }
}

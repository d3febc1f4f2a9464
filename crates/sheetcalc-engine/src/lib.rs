//! sheetcalc_engine - Formula evaluation engine for a sparse spreadsheet grid.

pub mod builtins;
pub mod engine;

#[cfg(test)]
mod tests {
    use crate::builtins::Function;
    use crate::engine::*;

    fn grid(cells: &[(&str, &str)]) -> Grid {
        let grid = Grid::new();
        for (name, input) in cells {
            grid.insert(name.parse::<CellRef>().unwrap(), Cell::from_input(input));
        }
        grid
    }

    #[test]
    fn test_codec_examples() {
        assert_eq!(encode(1, 1).unwrap(), "A1");
        assert_eq!(encode(26, 7).unwrap(), "Z7");
        assert_eq!(encode(27, 10).unwrap(), "AA10");
        assert_eq!(encode(702, 1).unwrap(), "ZZ1");
        assert_eq!(encode(703, 1).unwrap(), "AAA1");
        assert_eq!(decode("aa10").unwrap(), (27, 10));
        assert_eq!(encode(0, 1), Err(ErrorKind::InvalidReference));
        assert_eq!(decode("10A"), Err(ErrorKind::InvalidReference));
    }

    #[test]
    fn test_expand_a1_b2_row_major() {
        let names: Vec<String> = expand("A1:B2")
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(names, ["A1", "B1", "A2", "B2"]);
    }

    #[test]
    fn test_every_function_is_reachable_from_a_formula() {
        let grid = grid(&[("A1", "1"), ("A2", "2")]);
        let eval = Evaluator::new(&grid);
        for name in ["SUM", "AVERAGE", "MAX", "MIN", "COUNT"] {
            let value = eval.evaluate(&format!("={name}(A1:A2)"));
            assert!(value.as_number().is_some(), "{name} -> {value}");
        }
        for name in ["TRIM", "UPPER", "LOWER", "CLEAN"] {
            assert_eq!(eval.evaluate(&format!("={name}(A1)")), Value::from("1"));
        }
        assert!(Function::from_name("REMOVE_DUPLICATES").is_some());
    }

    #[test]
    fn test_stored_formulas_chain() {
        let grid = grid(&[
            ("A1", "10"),
            ("A2", "20"),
            ("A3", "30"),
            ("B1", "=SUM(A1:A3)"),
            ("B2", "=AVERAGE(A1:A3)"),
            ("C1", "=B1 - B2"),
        ]);
        let eval = Evaluator::new(&grid);
        assert_eq!(eval.evaluate_cell(&"C1".parse().unwrap()), Value::Number(40.0));
        assert_eq!(format_value(&eval.evaluate("=B2 / 4")), "5");
    }

    #[test]
    fn test_error_tokens_display() {
        let grid = grid(&[("A1", "=B1"), ("B1", "=A1")]);
        let eval = Evaluator::new(&grid);
        assert_eq!(eval.evaluate("=A1").to_string(), "#CIRCULAR_REF!");
        assert_eq!(eval.evaluate("=1/0").to_string(), "#DIV/0!");
        assert_eq!(eval.evaluate("=MAX(C1:C3)").to_string(), "#N/A");
        assert_eq!(eval.evaluate("=NOPE()").to_string(), "#UNKNOWN_FUNCTION!");
    }
}

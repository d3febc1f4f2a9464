//! Built-in spreadsheet functions and their metadata.
//!
//! Conventions:
//! - Function names are ALL CAPS and matched case-insensitively (`sum` is `SUM`).
//! - Arity is checked before any argument is looked at; a wrong count is
//!   `#PARAM_COUNT!`.
//! - Errors are contagious: the first error value among the arguments (ranges
//!   included, in argument order) is the result.
//! - If you add a function, add a `Function` variant, a `FUNCTIONS` entry and
//!   its arm in `Function::call`.

use std::collections::{HashMap, HashSet};

use crate::engine::{CellRef, ErrorKind, RangeRect, Value, format_value};

/// A resolved function argument.
#[derive(Clone, Debug, PartialEq)]
pub enum ArgValue {
    /// A reference, literal or nested expression, already evaluated.
    Scalar(Value),
    /// A `start:end` range with its cells in row-major order.
    Range {
        rect: RangeRect,
        cells: Vec<(CellRef, Value)>,
    },
}

impl ArgValue {
    fn values(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        match self {
            ArgValue::Scalar(value) => Box::new(std::iter::once(value)),
            ArgValue::Range { cells, .. } => Box::new(cells.iter().map(|(_, value)| value)),
        }
    }

    fn first_error(&self) -> Option<ErrorKind> {
        self.values().find_map(Value::as_error)
    }

    /// The single value this argument denotes. A range counts only when it
    /// covers exactly one cell.
    fn single(&self) -> Result<&Value, ErrorKind> {
        match self {
            ArgValue::Scalar(value) => Ok(value),
            ArgValue::Range { cells, .. } => match cells.as_slice() {
                [(_, value)] => Ok(value),
                _ => Err(ErrorKind::InvalidRange),
            },
        }
    }
}

/// How many arguments a function takes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    AtLeast(usize),
    Exactly(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::AtLeast(min) => count >= min,
            Arity::Exactly(n) => count == n,
        }
    }
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Function {
    Sum,
    Average,
    Max,
    Min,
    Count,
    Trim,
    Upper,
    Lower,
    Clean,
    FindAndReplace,
    RemoveDuplicates,
}

pub struct FunctionSpec {
    pub name: &'static str,
    pub function: Function,
    pub arity: Arity,
    pub description: &'static str,
}

pub const FUNCTIONS: &[FunctionSpec] = &[
    FunctionSpec {
        name: "SUM",
        function: Function::Sum,
        arity: Arity::AtLeast(1),
        description: "Sum of numeric values",
    },
    FunctionSpec {
        name: "AVERAGE",
        function: Function::Average,
        arity: Arity::AtLeast(1),
        description: "Mean of numeric values",
    },
    FunctionSpec {
        name: "MAX",
        function: Function::Max,
        arity: Arity::AtLeast(1),
        description: "Largest numeric value",
    },
    FunctionSpec {
        name: "MIN",
        function: Function::Min,
        arity: Arity::AtLeast(1),
        description: "Smallest numeric value",
    },
    FunctionSpec {
        name: "COUNT",
        function: Function::Count,
        arity: Arity::AtLeast(1),
        description: "Number of numeric values",
    },
    FunctionSpec {
        name: "TRIM",
        function: Function::Trim,
        arity: Arity::Exactly(1),
        description: "Strip leading and trailing whitespace",
    },
    FunctionSpec {
        name: "UPPER",
        function: Function::Upper,
        arity: Arity::Exactly(1),
        description: "Convert text to upper case",
    },
    FunctionSpec {
        name: "LOWER",
        function: Function::Lower,
        arity: Arity::Exactly(1),
        description: "Convert text to lower case",
    },
    FunctionSpec {
        name: "CLEAN",
        function: Function::Clean,
        arity: Arity::Exactly(1),
        description: "Remove non-printable characters",
    },
    FunctionSpec {
        name: "FIND_AND_REPLACE",
        function: Function::FindAndReplace,
        arity: Arity::Exactly(3),
        description: "Replace every occurrence of a substring",
    },
    FunctionSpec {
        name: "REMOVE_DUPLICATES",
        function: Function::RemoveDuplicates,
        arity: Arity::Exactly(1),
        description: "Count rows in a range that repeat an earlier row",
    },
];

impl Function {
    /// Look up a function by name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Function> {
        FUNCTIONS
            .iter()
            .find(|spec| spec.name.eq_ignore_ascii_case(name.trim()))
            .map(|spec| spec.function)
    }

    pub fn spec(self) -> &'static FunctionSpec {
        let index = match self {
            Function::Sum => 0,
            Function::Average => 1,
            Function::Max => 2,
            Function::Min => 3,
            Function::Count => 4,
            Function::Trim => 5,
            Function::Upper => 6,
            Function::Lower => 7,
            Function::Clean => 8,
            Function::FindAndReplace => 9,
            Function::RemoveDuplicates => 10,
        };
        &FUNCTIONS[index]
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn arity(self) -> Arity {
        self.spec().arity
    }

    /// Apply the function to resolved arguments.
    pub fn call(self, args: &[ArgValue]) -> Value {
        if !self.arity().accepts(args.len()) {
            return Value::Error(ErrorKind::ParamCount);
        }
        if let Some(kind) = args.iter().find_map(ArgValue::first_error) {
            return Value::Error(kind);
        }

        let result = match self {
            Function::Sum => Ok(Value::Number(numbers(args).sum())),
            Function::Average => average(args),
            Function::Max => extreme(args, f64::max),
            Function::Min => extreme(args, f64::min),
            Function::Count => Ok(Value::Number(numbers(args).count() as f64)),
            Function::Trim => map_text(&args[0], |s| s.trim().to_string()),
            Function::Upper => map_text(&args[0], str::to_uppercase),
            Function::Lower => map_text(&args[0], str::to_lowercase),
            Function::Clean => map_text(&args[0], |s| s.chars().filter(|c| !c.is_control()).collect()),
            Function::FindAndReplace => find_and_replace(&args[0], &args[1], &args[2]),
            Function::RemoveDuplicates => remove_duplicates(&args[0]),
        };
        result.unwrap_or_else(Value::Error)
    }
}

fn numbers(args: &[ArgValue]) -> impl Iterator<Item = f64> + '_ {
    args.iter()
        .flat_map(ArgValue::values)
        .filter_map(Value::as_number)
}

fn average(args: &[ArgValue]) -> Result<Value, ErrorKind> {
    let (sum, count) = numbers(args).fold((0.0, 0usize), |(sum, count), n| (sum + n, count + 1));
    if count == 0 {
        return Err(ErrorKind::DivideByZero);
    }
    Ok(Value::Number(sum / count as f64))
}

fn extreme(args: &[ArgValue], pick: fn(f64, f64) -> f64) -> Result<Value, ErrorKind> {
    numbers(args)
        .reduce(pick)
        .map(Value::Number)
        .ok_or(ErrorKind::NotApplicable)
}

/// Text form of a value; numbers go through the display formatter.
fn text_of(value: &Value) -> String {
    format_value(value)
}

fn map_text(arg: &ArgValue, f: impl Fn(&str) -> String) -> Result<Value, ErrorKind> {
    let text = text_of(arg.single()?);
    Ok(Value::Text(f(&text)))
}

fn find_and_replace(
    target: &ArgValue,
    find: &ArgValue,
    replace: &ArgValue,
) -> Result<Value, ErrorKind> {
    let text = text_of(target.single()?);
    let find = text_of(find.single()?);
    let replace = text_of(replace.single()?);
    if find.is_empty() {
        return Ok(Value::Text(text));
    }
    Ok(Value::Text(text.replace(&find, &replace)))
}

fn remove_duplicates(arg: &ArgValue) -> Result<Value, ErrorKind> {
    let ArgValue::Range { rect, cells } = arg else {
        return Err(ErrorKind::InvalidRange);
    };
    if rect.rows() < 2 {
        return Err(ErrorKind::InvalidRange);
    }
    let report = find_duplicate_rows(rect, cells);
    Ok(Value::Number(report.duplicate_rows.len() as f64))
}

/// Outcome of duplicate-row detection over a range.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DuplicateRows {
    pub analyzed_rows: usize,
    /// Rows equal to an earlier row, ascending.
    pub duplicate_rows: Vec<usize>,
    /// First occurrences, ascending.
    pub retained_rows: Vec<usize>,
}

const ROW_KEY_SEPARATOR: char = '\u{1f}';

/// Find rows of `rect` whose display values repeat an earlier row.
/// Cells missing from `cells` read as empty.
pub fn find_duplicate_rows(rect: &RangeRect, cells: &[(CellRef, Value)]) -> DuplicateRows {
    let lookup: HashMap<&CellRef, &Value> = cells.iter().map(|(cell, value)| (cell, value)).collect();
    let mut seen = HashSet::new();
    let mut report = DuplicateRows {
        analyzed_rows: rect.rows(),
        ..DuplicateRows::default()
    };

    for row in rect.start.row..=rect.end.row {
        let key = (rect.start.col..=rect.end.col)
            .map(|col| {
                lookup
                    .get(&CellRef::new(col, row))
                    .map(|value| format_value(value))
                    .unwrap_or_default()
            })
            .collect::<Vec<_>>()
            .join(&ROW_KEY_SEPARATOR.to_string());
        if seen.insert(key) {
            report.retained_rows.push(row);
        } else {
            report.duplicate_rows.push(row);
        }
    }
    report
}

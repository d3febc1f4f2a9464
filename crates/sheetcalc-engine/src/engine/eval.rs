//! Formula evaluation.
//!
//! The evaluator borrows a [`CellStore`] and resolves references recursively.
//! A [`ResolutionStack`] threaded through every recursive call records the
//! cells currently being evaluated: meeting one of them again is a circular
//! reference, and its length is bounded by [`EngineConfig::max_depth`].
//! Function calls nested inside arguments are counted on the same stack and
//! bounded by [`EngineConfig::max_nesting`].
//!
//! Evaluation never fails in the Rust sense. Every problem becomes an
//! [`ErrorKind`] value that the caller stores like any other result.

use std::collections::HashSet;
use tracing::{debug, trace, warn};

use super::arith::evaluate_arithmetic;
use super::cell::{CellStore, CellType};
use super::cell_ref::CellRef;
use super::config::EngineConfig;
use super::error::ErrorKind;
use super::parse::{Arg, Formula, parse};
use super::range::RangeRect;
use super::value::Value;
use crate::builtins::{ArgValue, DuplicateRows, Function, find_duplicate_rows};

/// Cells currently mid-evaluation, in the order they were entered.
#[derive(Clone, Debug, Default)]
pub struct ResolutionStack {
    path: Vec<CellRef>,
    members: HashSet<CellRef>,
    nesting: usize,
}

impl ResolutionStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// A stack that already contains the cell being written, so that a
    /// formula referring to its own cell is circular.
    pub fn with_root(cell: CellRef) -> Self {
        let mut stack = Self::new();
        stack.push(cell);
        stack
    }

    pub fn contains(&self, cell: &CellRef) -> bool {
        self.members.contains(cell)
    }

    /// Returns false (and leaves the stack unchanged) if `cell` is already on it.
    pub fn push(&mut self, cell: CellRef) -> bool {
        if !self.members.insert(cell.clone()) {
            return false;
        }
        self.path.push(cell);
        true
    }

    pub fn pop(&mut self) -> Option<CellRef> {
        let cell = self.path.pop()?;
        self.members.remove(&cell);
        Some(cell)
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn path(&self) -> &[CellRef] {
        &self.path
    }

    /// Nested argument expressions currently open.
    pub fn nesting(&self) -> usize {
        self.nesting
    }

    fn enter_nested(&mut self) {
        self.nesting += 1;
    }

    fn exit_nested(&mut self) {
        self.nesting = self.nesting.saturating_sub(1);
    }
}

/// Phases of a single formula evaluation, reported at trace level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvalState {
    Idle,
    Parsing,
    ResolvingArgs,
    Dispatching,
    Done,
    Error,
}

pub struct Evaluator<'a, S: CellStore + ?Sized> {
    store: &'a S,
    config: EngineConfig,
}

impl<'a, S: CellStore + ?Sized> Evaluator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: &'a S, config: EngineConfig) -> Self {
        Evaluator { store, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate raw input with a fresh resolution stack.
    pub fn evaluate(&self, input: &str) -> Value {
        self.evaluate_with_stack(input, &mut ResolutionStack::new())
    }

    /// Evaluate input that is about to be written to `cell`.
    pub fn evaluate_in(&self, cell: &CellRef, input: &str) -> Value {
        self.evaluate_with_stack(input, &mut ResolutionStack::with_root(cell.clone()))
    }

    /// Current value of a stored cell.
    pub fn evaluate_cell(&self, cell: &CellRef) -> Value {
        self.resolve_cell(cell, &mut ResolutionStack::new())
    }

    /// Evaluate raw input within an ongoing resolution.
    ///
    /// Input that does not start with `=` is a literal and is classified the
    /// way cell input is: numbers come back as numbers, anything else as-is.
    pub fn evaluate_with_stack(&self, input: &str, stack: &mut ResolutionStack) -> Value {
        if !input.starts_with('=') {
            return literal(input);
        }

        trace!(state = ?EvalState::Parsing, input, depth = stack.depth());
        let formula = match parse(input) {
            Ok(formula) => formula,
            Err(err) => {
                debug!(input, %err, "formula failed to parse");
                trace!(state = ?EvalState::Error, input);
                return Value::Error(err.into());
            }
        };

        let value = match formula {
            Formula::Reference(cell) => self.resolve_cell(&cell, stack),
            Formula::Arithmetic(expr) => {
                evaluate_arithmetic(&expr, |cell| self.resolve_cell(cell, stack))
            }
            Formula::Call { name, args } => self.call(&name, &args, stack),
        };

        let state = if value.is_error() {
            EvalState::Error
        } else {
            EvalState::Done
        };
        trace!(state = ?state, input, result = %value);
        value
    }

    /// Resolve one cell reference.
    pub fn resolve_cell(&self, cell: &CellRef, stack: &mut ResolutionStack) -> Value {
        if stack.contains(cell) {
            debug!(cell = %cell, path = ?stack.path(), "circular reference");
            return Value::Error(ErrorKind::CircularReference);
        }
        if let Some(value) = self.store.cached_value(cell) {
            return value;
        }

        let Some(input) = self.store.raw_input(cell) else {
            return Value::Empty;
        };
        if !input.starts_with('=') {
            return literal(&input);
        }
        // Only formula cells count towards the depth.
        if stack.depth() >= self.config.max_depth {
            warn!(cell = %cell, max_depth = self.config.max_depth, "reference depth exceeded");
            return Value::Error(ErrorKind::DepthExceeded);
        }

        stack.push(cell.clone());
        let value = self.evaluate_with_stack(&input, stack);
        stack.pop();
        value
    }

    /// Detect duplicate rows in a `start:end` range.
    pub fn duplicate_rows(&self, range: &str) -> Result<DuplicateRows, ErrorKind> {
        let mut stack = ResolutionStack::new();
        let (rect, cells) = self.resolve_range(range, &mut stack)?;
        Ok(find_duplicate_rows(&rect, &cells))
    }

    fn call(&self, name: &str, args: &[Arg], stack: &mut ResolutionStack) -> Value {
        let Some(function) = Function::from_name(name) else {
            debug!(name, "unknown function");
            return Value::Error(ErrorKind::UnknownFunction);
        };
        if !function.arity().accepts(args.len()) {
            return Value::Error(ErrorKind::ParamCount);
        }

        trace!(state = ?EvalState::ResolvingArgs, function = function.name(), args = args.len());
        let resolved: Vec<ArgValue> = args
            .iter()
            .map(|arg| self.resolve_arg(arg, stack))
            .collect();

        trace!(state = ?EvalState::Dispatching, function = function.name());
        function.call(&resolved)
    }

    fn resolve_arg(&self, arg: &Arg, stack: &mut ResolutionStack) -> ArgValue {
        match arg {
            Arg::Reference(cell) => ArgValue::Scalar(self.resolve_cell(cell, stack)),
            Arg::Range(spec) => match self.resolve_range(spec, stack) {
                Ok((rect, cells)) => ArgValue::Range { rect, cells },
                Err(kind) => ArgValue::Scalar(Value::Error(kind)),
            },
            Arg::Text(text) => ArgValue::Scalar(Value::Text(text.clone())),
            Arg::Number(n) => ArgValue::Scalar(Value::Number(*n)),
            Arg::Expr(expr) => {
                if stack.nesting() >= self.config.max_nesting {
                    warn!(max_nesting = self.config.max_nesting, "formula nesting exceeded");
                    return ArgValue::Scalar(Value::Error(ErrorKind::DepthExceeded));
                }
                stack.enter_nested();
                let value = self.evaluate_with_stack(&format!("={expr}"), stack);
                stack.exit_nested();
                ArgValue::Scalar(value)
            }
        }
    }

    fn resolve_range(
        &self,
        spec: &str,
        stack: &mut ResolutionStack,
    ) -> Result<(RangeRect, Vec<(CellRef, Value)>), ErrorKind> {
        let rect = RangeRect::parse(spec)?;
        match rect.cell_count() {
            Some(count) if count <= self.config.max_range_cells => {}
            _ => {
                warn!(range = spec, limit = self.config.max_range_cells, "range too large");
                return Err(ErrorKind::InvalidRange);
            }
        }

        let cells = rect
            .cells()
            .map(|cell| {
                let value = self.resolve_cell(&cell, stack);
                (cell, value)
            })
            .collect();
        Ok((rect, cells))
    }
}

fn literal(input: &str) -> Value {
    CellType::from_input(input)
        .literal_value()
        .unwrap_or_default()
}

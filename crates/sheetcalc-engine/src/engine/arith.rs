//! Arithmetic formulas (`=A1 * 2 + B3`).
//!
//! References are substituted textually with their numeric values and every
//! numeric literal is rewritten as a float literal. What is left must be pure
//! arithmetic (digits, `.`, `+ - * / %`, parentheses, whitespace); anything
//! else is rejected before it reaches Rhai, which only ever sees operators on
//! float constants.

use regex::{Captures, Regex};
use rhai::packages::{ArithmeticPackage, Package};
use rhai::{Dynamic, Engine, EvalAltResult};
use std::sync::OnceLock;
use tracing::debug;

use super::cell_ref::CellRef;
use super::error::ErrorKind;
use super::value::Value;

const MAX_EXPR_DEPTH: usize = 64;
const MAX_OPERATIONS: u64 = 100_000;

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[A-Za-z]+[0-9]+\b|[0-9]*\.?[0-9]+").expect("arithmetic token regex must compile")
    })
}

fn safe_expr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[0-9.+\-*/%()\s]+$").expect("arithmetic whitelist regex must compile")
    })
}

fn arith_engine() -> &'static Engine {
    static ENGINE: OnceLock<Engine> = OnceLock::new();
    ENGINE.get_or_init(|| {
        // Operators only: no strings, arrays or library functions.
        let mut engine = Engine::new_raw();
        ArithmeticPackage::new().register_into_engine(&mut engine);
        engine.set_max_expr_depths(MAX_EXPR_DEPTH, MAX_EXPR_DEPTH);
        engine.set_max_operations(MAX_OPERATIONS);
        engine
    })
}

/// Render a number as a Rhai float literal (never in exponent form).
fn float_literal(n: f64) -> String {
    let text = n.to_string();
    if text.contains('.') {
        text
    } else {
        format!("{text}.0")
    }
}

fn operand(n: f64) -> String {
    if n.is_sign_negative() && n != 0.0 {
        format!("({})", float_literal(n))
    } else {
        float_literal(n.abs())
    }
}

/// Evaluate an arithmetic formula body. `resolve` supplies the value of each
/// referenced cell; non-numeric values count as 0 and error values are
/// returned as the result.
pub(crate) fn evaluate_arithmetic<F>(expr: &str, mut resolve: F) -> Value
where
    F: FnMut(&CellRef) -> Value,
{
    let mut failure: Option<ErrorKind> = None;
    let substituted = token_re().replace_all(expr, |caps: &Captures| {
        if failure.is_some() {
            return String::new();
        }
        let token = &caps[0];
        if token.starts_with(|c: char| c.is_ascii_alphabetic()) {
            let Some(cell_ref) = CellRef::parse(token) else {
                failure = Some(ErrorKind::InvalidReference);
                return String::new();
            };
            match resolve(&cell_ref) {
                Value::Error(kind) => {
                    failure = Some(kind);
                    String::new()
                }
                value => operand(value.as_number().unwrap_or(0.0)),
            }
        } else {
            match token.parse::<f64>() {
                Ok(n) => float_literal(n),
                Err(_) => {
                    failure = Some(ErrorKind::Parse);
                    String::new()
                }
            }
        }
    });

    if let Some(kind) = failure {
        return Value::Error(kind);
    }
    if !safe_expr_re().is_match(&substituted) {
        debug!(expr, "rejected arithmetic expression");
        return Value::Error(ErrorKind::Parse);
    }

    match arith_engine().eval_expression::<Dynamic>(&substituted) {
        Ok(result) => number_result(result),
        Err(err) => {
            debug!(expr, %err, "arithmetic evaluation failed");
            match *err {
                EvalAltResult::ErrorArithmetic(..) => Value::Error(ErrorKind::DivideByZero),
                _ => Value::Error(ErrorKind::Parse),
            }
        }
    }
}

fn number_result(result: Dynamic) -> Value {
    let n = if let Ok(n) = result.as_float() {
        n
    } else if let Ok(n) = result.as_int() {
        n as f64
    } else {
        return Value::Error(ErrorKind::Parse);
    };
    if n.is_finite() {
        Value::Number(n)
    } else {
        Value::Error(ErrorKind::DivideByZero)
    }
}

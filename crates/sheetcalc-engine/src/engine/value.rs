//! Computed cell values and the numeric coercion rule.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use super::error::ErrorKind;
use super::format::format_value;

/// The result of evaluating a cell or formula.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Error(ErrorKind),
}

fn decimal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)$")
            .expect("decimal number regex must compile")
    })
}

/// Parse text that is *entirely* a plain decimal number: optional sign,
/// digits, optional decimal point. No exponents, no `inf`/`nan`, no
/// surrounding whitespace.
pub fn coerce_number(text: &str) -> Option<f64> {
    if !decimal_re().is_match(text) {
        return None;
    }
    text.parse::<f64>().ok()
}

impl Value {
    /// The numeric reading of this value, if it has one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => coerce_number(s),
            Value::Empty | Value::Error(_) => None,
        }
    }

    pub fn as_error(&self) -> Option<ErrorKind> {
        match self {
            Value::Error(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_value(self))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<ErrorKind> for Value {
    fn from(kind: ErrorKind) -> Self {
        Value::Error(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_number_accepts_plain_decimals() {
        assert_eq!(coerce_number("5"), Some(5.0));
        assert_eq!(coerce_number("-2.5"), Some(-2.5));
        assert_eq!(coerce_number("+3"), Some(3.0));
        assert_eq!(coerce_number(".5"), Some(0.5));
        assert_eq!(coerce_number("7."), Some(7.0));
    }

    #[test]
    fn test_coerce_number_rejects_partial_and_exotic_forms() {
        for bad in ["", " 5", "5 ", "1e3", "inf", "NaN", "1,000", "12abc", "-", ".", "0x10"] {
            assert_eq!(coerce_number(bad), None, "{bad:?}");
        }
    }

    #[test]
    fn test_as_number() {
        assert_eq!(Value::Number(4.0).as_number(), Some(4.0));
        assert_eq!(Value::from("4").as_number(), Some(4.0));
        assert_eq!(Value::from("x").as_number(), None);
        assert_eq!(Value::Empty.as_number(), None);
        assert_eq!(Value::Error(ErrorKind::Parse).as_number(), None);
    }
}

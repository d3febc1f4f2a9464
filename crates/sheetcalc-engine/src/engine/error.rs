//! Error values produced by formula evaluation.
//!
//! [`ErrorKind`] is a *value*, not a Rust failure: it is stored in cells,
//! displayed as a token (`#DIV/0!`, `#CIRCULAR_REF!`, ...) and propagates
//! through every formula that consumes it. [`ParseError`] describes why a
//! formula string could not be parsed and collapses into an [`ErrorKind`]
//! once it crosses the evaluator boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// All error tokens the engine can produce.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ErrorKind {
    Parse,
    InvalidReference,
    InvalidRange,
    CircularReference,
    DivideByZero,
    UnknownFunction,
    ParamCount,
    NotApplicable,
    DepthExceeded,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 9] = [
        ErrorKind::Parse,
        ErrorKind::InvalidReference,
        ErrorKind::InvalidRange,
        ErrorKind::CircularReference,
        ErrorKind::DivideByZero,
        ErrorKind::UnknownFunction,
        ErrorKind::ParamCount,
        ErrorKind::NotApplicable,
        ErrorKind::DepthExceeded,
    ];

    /// The token shown in a cell holding this error.
    pub fn token(self) -> &'static str {
        match self {
            ErrorKind::Parse => "#PARSE_ERROR!",
            ErrorKind::InvalidReference => "#INVALID_REF!",
            ErrorKind::InvalidRange => "#INVALID_RANGE!",
            ErrorKind::CircularReference => "#CIRCULAR_REF!",
            ErrorKind::DivideByZero => "#DIV/0!",
            ErrorKind::UnknownFunction => "#UNKNOWN_FUNCTION!",
            ErrorKind::ParamCount => "#PARAM_COUNT!",
            ErrorKind::NotApplicable => "#N/A",
            ErrorKind::DepthExceeded => "#REF_DEPTH_EXCEEDED!",
        }
    }

    /// Recognise a displayed token (case-insensitive).
    pub fn from_token(token: &str) -> Option<ErrorKind> {
        let token = token.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.token().eq_ignore_ascii_case(token))
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl std::error::Error for ErrorKind {}

/// Why a formula string failed to parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("formula must start with '='")]
    MissingEquals,

    #[error("formula is empty")]
    Empty,

    #[error("unbalanced parenthesis at byte {0}")]
    UnbalancedParens(usize),

    #[error("unterminated string literal starting at byte {0}")]
    UnterminatedString(usize),

    #[error("invalid cell reference: {0}")]
    InvalidReference(String),

    #[error("empty argument at position {0}")]
    EmptyArgument(usize),
}

impl From<ParseError> for ErrorKind {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::InvalidReference(_) => ErrorKind::InvalidReference,
            _ => ErrorKind::Parse,
        }
    }
}

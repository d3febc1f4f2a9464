//! Formula parsing.
//!
//! A formula is text starting with `=`. The body is one of:
//!
//! - a function call `NAME(arg, arg, ...)` whose parentheses wrap the whole body,
//! - a bare cell reference (`B7`),
//! - anything else, treated as an arithmetic expression.
//!
//! Arguments are split on top-level commas. Commas nested inside parentheses
//! or inside double-quoted literals do not split; `""` inside a literal is an
//! escaped quote.

use regex::Regex;
use std::iter::Peekable;
use std::str::CharIndices;
use std::sync::OnceLock;

use super::cell_ref::CellRef;
use super::error::ParseError;
use super::value::coerce_number;

/// A parsed formula body.
#[derive(Clone, Debug, PartialEq)]
pub enum Formula {
    /// `NAME(args)`; the name is uppercased, not yet checked against the library.
    Call { name: String, args: Vec<Arg> },
    Reference(CellRef),
    Arithmetic(String),
}

/// One function argument, classified but not resolved.
#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    Reference(CellRef),
    /// Range text such as `A1:B3`, expanded at evaluation time.
    Range(String),
    /// A quoted literal with the quotes stripped and `""` unescaped.
    Text(String),
    Number(f64),
    /// Any other argument text, evaluated as a nested formula body.
    Expr(String),
}

fn call_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*\(").expect("call prefix regex must compile")
    })
}

fn range_arg_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z]+[0-9]+\s*:\s*[A-Za-z]+[0-9]+$").expect("range arg regex must compile")
    })
}

/// Parse a formula string (including its leading `=`).
pub fn parse(formula: &str) -> Result<Formula, ParseError> {
    let body = formula
        .strip_prefix('=')
        .ok_or(ParseError::MissingEquals)?
        .trim();
    if body.is_empty() {
        return Err(ParseError::Empty);
    }
    check_balance(body)?;

    if let Some(m) = call_prefix_re().captures(body) {
        let whole = m.get(0).map(|g| g.end()).unwrap_or(0);
        let open = whole - 1;
        if matching_paren(body, open) == Some(body.len() - 1) {
            let name = m[1].to_ascii_uppercase();
            let args = split_args(&body[open + 1..body.len() - 1])?;
            return Ok(Formula::Call { name, args });
        }
    }

    if CellRef::looks_like_ref(body) {
        return CellRef::parse(body)
            .map(Formula::Reference)
            .ok_or_else(|| ParseError::InvalidReference(body.to_string()));
    }

    Ok(Formula::Arithmetic(body.to_string()))
}

/// Skip the rest of a quoted literal whose opening quote was just consumed.
/// Returns false when the literal never closes.
fn skip_string(chars: &mut Peekable<CharIndices<'_>>) -> bool {
    while let Some((_, c)) = chars.next() {
        if c == '"' {
            if matches!(chars.peek(), Some((_, '"'))) {
                chars.next();
            } else {
                return true;
            }
        }
    }
    false
}

fn check_balance(text: &str) -> Result<(), ParseError> {
    let mut open_positions = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => {
                if !skip_string(&mut chars) {
                    return Err(ParseError::UnterminatedString(i));
                }
            }
            '(' => open_positions.push(i),
            ')' => {
                if open_positions.pop().is_none() {
                    return Err(ParseError::UnbalancedParens(i));
                }
            }
            _ => {}
        }
    }
    match open_positions.pop() {
        Some(pos) => Err(ParseError::UnbalancedParens(pos)),
        None => Ok(()),
    }
}

/// Byte index of the parenthesis closing the one at `open`.
fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut chars = text[open..].char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => {
                if !skip_string(&mut chars) {
                    return None;
                }
            }
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split raw argument text on top-level commas and classify each argument.
pub fn split_args(raw: &str) -> Result<Vec<Arg>, ParseError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut chars = raw.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => {
                if !skip_string(&mut chars) {
                    return Err(ParseError::UnterminatedString(i));
                }
            }
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or(ParseError::UnbalancedParens(i))?;
            }
            ',' if depth == 0 => {
                pieces.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(&raw[start..]);

    pieces
        .into_iter()
        .enumerate()
        .map(|(idx, piece)| {
            let piece = piece.trim();
            if piece.is_empty() {
                return Err(ParseError::EmptyArgument(idx));
            }
            classify_arg(piece)
        })
        .collect()
}

fn classify_arg(text: &str) -> Result<Arg, ParseError> {
    if let Some(literal) = quoted_literal(text) {
        return Ok(Arg::Text(literal));
    }
    if CellRef::looks_like_ref(text) {
        return CellRef::parse(text)
            .map(Arg::Reference)
            .ok_or_else(|| ParseError::InvalidReference(text.to_string()));
    }
    if range_arg_re().is_match(text) {
        return Ok(Arg::Range(text.to_string()));
    }
    if let Some(n) = coerce_number(text) {
        return Ok(Arg::Number(n));
    }
    Ok(Arg::Expr(text.to_string()))
}

/// If `text` is exactly one quoted literal, return its unescaped contents.
fn quoted_literal(text: &str) -> Option<String> {
    let inner = text.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            // Inside the literal a quote is only legal as the first half of `""`.
            if chars.next() != Some('"') {
                return None;
            }
        }
        out.push(c);
    }
    Some(out)
}

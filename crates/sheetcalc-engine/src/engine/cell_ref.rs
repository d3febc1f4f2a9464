//! Cell reference parsing and formatting.
//!
//! Provides bidirectional conversion between spreadsheet-style cell references
//! (e.g., "A1", "B2", "AA100") and 1-based column/row coordinates. Columns use
//! bijective base-26: there is no zero digit, so A=1 ... Z=26, AA=27.
//!
//! # Examples
//!
//! ```
//! use sheetcalc_engine::engine::CellRef;
//!
//! let cell = CellRef::parse("b3").unwrap();
//! assert_eq!(cell.col, 2);
//! assert_eq!(cell.row, 3);
//! assert_eq!(cell.to_string(), "B3");
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use super::error::ErrorKind;

/// A reference to a cell by 1-based column and row.
///
/// Field order makes the derived ordering row-major.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

fn a1_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?<letters>[A-Za-z]+)(?<numbers>[0-9]+)$")
            .expect("A1 reference regex must compile")
    })
}

/// Matches reference-shaped words inside formula text (`A1`, `bc12`).
pub(crate) fn embedded_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([A-Za-z]+)([0-9]+)\b").expect("embedded reference regex must compile")
    })
}

impl CellRef {
    pub fn new(col: usize, row: usize) -> CellRef {
        CellRef { row, col }
    }

    /// Parse a cell reference from A1 notation. Returns None if the input is invalid.
    pub fn parse(name: &str) -> Option<CellRef> {
        let caps = a1_re().captures(name)?;
        let col = letters_to_col(&caps["letters"])?;
        let row = caps["numbers"]
            .trim_start_matches('0')
            .parse::<usize>()
            .ok()
            .filter(|row| *row >= 1)?;
        Some(CellRef::new(col, row))
    }

    /// Whether the text has the shape of a reference (letters then digits),
    /// regardless of whether it decodes.
    pub fn looks_like_ref(text: &str) -> bool {
        a1_re().is_match(text)
    }
}

/// Convert a 1-based column index to letters (1 -> A, 26 -> Z, 27 -> AA).
/// Column 0 has no letters.
pub fn col_to_letters(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    while n > 0 {
        n -= 1;
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    result
}

/// Convert column letters (any case) to a 1-based column index.
pub fn letters_to_col(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut col = 0usize;
    for c in letters.bytes() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() - b'A') as usize + 1;
        col = col.checked_mul(26)?.checked_add(digit)?;
    }
    Some(col)
}

/// Encode a 1-based (column, row) pair as a canonical reference.
pub fn encode(col: usize, row: usize) -> Result<String, ErrorKind> {
    if col == 0 || row == 0 {
        return Err(ErrorKind::InvalidReference);
    }
    Ok(format!("{}{}", col_to_letters(col), row))
}

/// Decode a reference into its 1-based (column, row) pair.
pub fn decode(name: &str) -> Result<(usize, usize), ErrorKind> {
    CellRef::parse(name)
        .map(|cell| (cell.col, cell.row))
        .ok_or(ErrorKind::InvalidReference)
}

/// Uppercase letters, drop leading zeros from the row.
pub fn canonicalize(name: &str) -> Result<String, ErrorKind> {
    let (col, row) = decode(name)?;
    encode(col, row)
}

impl std::str::FromStr for CellRef {
    type Err = ErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CellRef::parse(s).ok_or(ErrorKind::InvalidReference)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", col_to_letters(self.col), self.row)
    }
}

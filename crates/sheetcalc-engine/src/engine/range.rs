//! Range expansion.
//!
//! Turns `A1:C5` rectangles and `A1,B1,C1` lists into ordered cell sequences.
//! Rectangles are enumerated row-major: for each row, for each column.
//!
//! Policy: an empty spec expands to nothing; anything else that does not
//! decode is `InvalidRange`.

use serde::{Deserialize, Serialize};

use super::cell_ref::CellRef;
use super::error::ErrorKind;

pub const MAX_RANGE_CELLS: usize = 1_000_000;

/// A normalized rectangle: `start` is the top-left corner, `end` the bottom-right.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RangeRect {
    pub start: CellRef,
    pub end: CellRef,
}

impl RangeRect {
    pub fn new(a: &CellRef, b: &CellRef) -> RangeRect {
        RangeRect {
            start: CellRef::new(a.col.min(b.col), a.row.min(b.row)),
            end: CellRef::new(a.col.max(b.col), a.row.max(b.row)),
        }
    }

    /// Parse `start:end`. Whitespace around either endpoint is ignored.
    pub fn parse(spec: &str) -> Result<RangeRect, ErrorKind> {
        let (start, end) = spec.split_once(':').ok_or(ErrorKind::InvalidRange)?;
        if end.contains(':') {
            return Err(ErrorKind::InvalidRange);
        }
        let start = CellRef::parse(start.trim()).ok_or(ErrorKind::InvalidRange)?;
        let end = CellRef::parse(end.trim()).ok_or(ErrorKind::InvalidRange)?;
        Ok(RangeRect::new(&start, &end))
    }

    pub fn rows(&self) -> usize {
        self.end.row - self.start.row + 1
    }

    pub fn cols(&self) -> usize {
        self.end.col - self.start.col + 1
    }

    /// None when the count does not fit in usize.
    pub fn cell_count(&self) -> Option<usize> {
        self.rows().checked_mul(self.cols())
    }

    pub fn contains(&self, cell: &CellRef) -> bool {
        (self.start.row..=self.end.row).contains(&cell.row)
            && (self.start.col..=self.end.col).contains(&cell.col)
    }

    /// Cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellRef> + '_ {
        (self.start.row..=self.end.row).flat_map(move |row| {
            (self.start.col..=self.end.col).map(move |col| CellRef::new(col, row))
        })
    }
}

/// Expand a range spec with the default cell limit.
pub fn expand(spec: &str) -> Result<Vec<CellRef>, ErrorKind> {
    expand_with_limit(spec, MAX_RANGE_CELLS)
}

/// Expand a range spec, failing with `InvalidRange` once more than
/// `max_cells` cells would be produced.
pub fn expand_with_limit(spec: &str, max_cells: usize) -> Result<Vec<CellRef>, ErrorKind> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Ok(Vec::new());
    }

    let mut cells = Vec::new();
    for token in spec.split(',') {
        let token = token.trim();
        if token.is_empty() {
            return Err(ErrorKind::InvalidRange);
        }

        if token.contains(':') {
            let rect = RangeRect::parse(token)?;
            let count = rect.cell_count().ok_or(ErrorKind::InvalidRange)?;
            if cells.len().saturating_add(count) > max_cells {
                return Err(ErrorKind::InvalidRange);
            }
            cells.extend(rect.cells());
        } else {
            let cell = CellRef::parse(token).ok_or(ErrorKind::InvalidRange)?;
            if cells.len() >= max_cells {
                return Err(ErrorKind::InvalidRange);
            }
            cells.push(cell);
        }
    }

    Ok(cells)
}

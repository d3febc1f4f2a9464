//! Circular dependency detection for formula cells.
//!
//! The evaluator already breaks cycles while resolving (a reference met twice
//! on the resolution stack yields `#CIRCULAR_REF!`). This module finds them up
//! front from stored dependencies, so a host can report a cycle when the edit
//! that closes it is made.

use std::collections::HashSet;

use super::{CellRef, CellStore};

/// Detect circular dependencies starting from a cell.
/// Returns Some(cycle_path) if a cycle is found, None otherwise. The last
/// element of the path is the cell that closes the cycle.
pub fn detect_cycle<S: CellStore + ?Sized>(start: &CellRef, store: &S) -> Option<Vec<CellRef>> {
    find_cycle([start.clone()], store)
}

/// Like [`detect_cycle`] for several starting cells at once. Cells already
/// cleared from one start are not walked again from the next.
///
/// The walk keeps its own stack, so chains of any length are fine.
pub fn find_cycle<S, I>(starts: I, store: &S) -> Option<Vec<CellRef>>
where
    S: CellStore + ?Sized,
    I: IntoIterator<Item = CellRef>,
{
    let mut visiting = HashSet::new();
    let mut finished = HashSet::new();
    let mut path: Vec<CellRef> = Vec::new();
    // Dependencies of each cell on `path`, and the next one to visit.
    let mut frames: Vec<(Vec<CellRef>, usize)> = Vec::new();

    for start in starts {
        if finished.contains(&start) {
            continue;
        }
        let deps = store.dependencies(&start);
        if deps.is_empty() {
            finished.insert(start);
            continue;
        }
        visiting.insert(start.clone());
        path.push(start);
        frames.push((deps, 0));

        while let Some((deps, next)) = frames.last_mut() {
            let Some(dep) = deps.get(*next).cloned() else {
                frames.pop();
                if let Some(done) = path.pop() {
                    visiting.remove(&done);
                    finished.insert(done);
                }
                continue;
            };
            *next += 1;

            if visiting.contains(&dep) {
                path.push(dep);
                return Some(path);
            }
            if finished.contains(&dep) {
                continue;
            }
            let dep_deps = store.dependencies(&dep);
            if dep_deps.is_empty() {
                finished.insert(dep);
                continue;
            }
            visiting.insert(dep.clone());
            path.push(dep);
            frames.push((dep_deps, 0));
        }
    }
    None
}

//! Dependency graph between cells.
//!
//! Edges run both ways: `precedents[c]` are the cells `c` reads, and
//! `dependents[p]` are the cells that read `p`. Cells need not exist in the
//! grid to appear here; a formula may depend on a cell nobody has written yet.

use sheetcalc_engine::engine::CellRef;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct DependencyGraph {
    precedents: HashMap<CellRef, HashSet<CellRef>>,
    dependents: HashMap<CellRef, HashSet<CellRef>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the dependencies of `cell`.
    pub fn set_dependencies<I>(&mut self, cell: &CellRef, precedents: I)
    where
        I: IntoIterator<Item = CellRef>,
    {
        self.clear_dependencies(cell);

        let precedents: HashSet<CellRef> = precedents.into_iter().collect();
        if precedents.is_empty() {
            return;
        }
        for prec in &precedents {
            self.dependents
                .entry(prec.clone())
                .or_default()
                .insert(cell.clone());
        }
        self.precedents.insert(cell.clone(), precedents);
    }

    /// Drop every outgoing edge of `cell` (it became a literal or was cleared).
    pub fn clear_dependencies(&mut self, cell: &CellRef) {
        let Some(old) = self.precedents.remove(cell) else {
            return;
        };
        for prec in old {
            if let Some(deps) = self.dependents.get_mut(&prec) {
                deps.remove(cell);
                if deps.is_empty() {
                    self.dependents.remove(&prec);
                }
            }
        }
    }

    /// Direct precedents of a cell, row-major.
    pub fn precedents_of(&self, cell: &CellRef) -> Vec<CellRef> {
        sorted(self.precedents.get(cell))
    }

    /// Direct dependents of a cell, row-major.
    pub fn dependents_of(&self, cell: &CellRef) -> Vec<CellRef> {
        sorted(self.dependents.get(cell))
    }

    /// The changed cells plus everything that transitively depends on them,
    /// ordered so every cell comes after the cells it reads.
    ///
    /// Reverse DFS post-order over dependent edges. Cells on a cycle are all
    /// included; their relative order is unspecified.
    pub fn recalc_order(&self, changed: &[CellRef]) -> Vec<CellRef> {
        let mut visited = HashSet::new();
        let mut post_order = Vec::new();

        for start in changed {
            if !visited.insert(start.clone()) {
                continue;
            }
            let mut stack = vec![(start.clone(), self.dependents_of(start), 0usize)];
            while let Some((cell, children, next)) = stack.last_mut() {
                if let Some(child) = children.get(*next) {
                    *next += 1;
                    let child = child.clone();
                    if visited.insert(child.clone()) {
                        let grandchildren = self.dependents_of(&child);
                        stack.push((child, grandchildren, 0));
                    }
                } else {
                    post_order.push(cell.clone());
                    stack.pop();
                }
            }
        }

        post_order.reverse();
        post_order
    }

    pub fn formula_cell_count(&self) -> usize {
        self.precedents.len()
    }

    pub fn clear(&mut self) {
        self.precedents.clear();
        self.dependents.clear();
    }
}

fn sorted(cells: Option<&HashSet<CellRef>>) -> Vec<CellRef> {
    let mut cells: Vec<CellRef> = cells.into_iter().flatten().cloned().collect();
    cells.sort();
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(name: &str) -> CellRef {
        CellRef::parse(name).unwrap()
    }

    fn refs(names: &[&str]) -> Vec<CellRef> {
        names.iter().map(|n| r(n)).collect()
    }

    fn position(order: &[CellRef], name: &str) -> usize {
        order.iter().position(|c| *c == r(name)).unwrap()
    }

    #[test]
    fn test_set_and_replace_dependencies() {
        let mut graph = DependencyGraph::new();
        graph.set_dependencies(&r("C1"), refs(&["A1", "B1"]));
        assert_eq!(graph.precedents_of(&r("C1")), refs(&["A1", "B1"]));
        assert_eq!(graph.dependents_of(&r("A1")), refs(&["C1"]));

        graph.set_dependencies(&r("C1"), refs(&["B1"]));
        assert!(graph.dependents_of(&r("A1")).is_empty());
        assert_eq!(graph.dependents_of(&r("B1")), refs(&["C1"]));

        graph.clear_dependencies(&r("C1"));
        assert!(graph.dependents_of(&r("B1")).is_empty());
        assert_eq!(graph.formula_cell_count(), 0);
    }

    #[test]
    fn test_recalc_order_chain() {
        let mut graph = DependencyGraph::new();
        graph.set_dependencies(&r("A2"), refs(&["A1"]));
        graph.set_dependencies(&r("A3"), refs(&["A2"]));
        assert_eq!(graph.recalc_order(&refs(&["A1"])), refs(&["A1", "A2", "A3"]));
        assert_eq!(graph.recalc_order(&refs(&["A3"])), refs(&["A3"]));
    }

    #[test]
    fn test_recalc_order_diamond() {
        let mut graph = DependencyGraph::new();
        graph.set_dependencies(&r("B1"), refs(&["A1"]));
        graph.set_dependencies(&r("C1"), refs(&["A1"]));
        graph.set_dependencies(&r("D1"), refs(&["B1", "C1"]));
        let order = graph.recalc_order(&refs(&["A1"]));
        assert_eq!(order.len(), 4);
        assert_eq!(position(&order, "A1"), 0);
        assert!(position(&order, "B1") < position(&order, "D1"));
        assert!(position(&order, "C1") < position(&order, "D1"));
    }

    #[test]
    fn test_recalc_order_multiple_starts() {
        let mut graph = DependencyGraph::new();
        graph.set_dependencies(&r("C1"), refs(&["A1", "B1"]));
        let order = graph.recalc_order(&refs(&["A1", "B1"]));
        assert_eq!(order.len(), 3);
        assert_eq!(order.last(), Some(&r("C1")));
    }

    #[test]
    fn test_recalc_order_terminates_on_cycle() {
        let mut graph = DependencyGraph::new();
        graph.set_dependencies(&r("A1"), refs(&["B1"]));
        graph.set_dependencies(&r("B1"), refs(&["A1"]));
        graph.set_dependencies(&r("C1"), refs(&["B1"]));
        let order = graph.recalc_order(&refs(&["A1"]));
        assert_eq!(order.len(), 3);
        assert_eq!(order[0], r("A1"));
    }
}

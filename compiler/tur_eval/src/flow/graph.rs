//! Cell dependency graph of a flow.
//!
//! Built once per flow run from the identifiers each cell's command reads.
//! Cells are addressed by their index in the flow definition.

use rustc_hash::{FxHashMap, FxHashSet};
use tur_ir::{FlowCell, Name};

use crate::errors::{invalid_flow, EvalError};

#[derive(Debug)]
pub(super) struct FlowGraph {
    /// `dependents[i]`: cells reading cell `i`, in definition order.
    dependents: Vec<Vec<usize>>,
    /// `inputs[i]`: cells that cell `i` reads.
    inputs: Vec<FxHashSet<usize>>,
    entries: Vec<usize>,
}

impl FlowGraph {
    /// Analyze `cells` and reject flows that cannot run sensibly: no cells,
    /// duplicate ids, cells no entry cell ever leads to, and cycles that do
    /// not pass through an entry cell.
    pub(super) fn analyze(flow: &str, cells: &[FlowCell]) -> Result<Self, EvalError> {
        if cells.is_empty() {
            return Err(invalid_flow(flow, "a flow needs at least one cell"));
        }
        let mut index: FxHashMap<&Name, usize> = FxHashMap::default();
        for (i, cell) in cells.iter().enumerate() {
            if index.insert(&cell.id, i).is_some() {
                return Err(invalid_flow(
                    flow,
                    format!("cell '{}' is defined more than once", cell.id),
                ));
            }
        }

        let mut dependents = vec![Vec::new(); cells.len()];
        let mut inputs = vec![FxHashSet::default(); cells.len()];
        for (i, cell) in cells.iter().enumerate() {
            for name in cell.command.referenced_identifiers() {
                if let Some(&j) = index.get(&name) {
                    inputs[i].insert(j);
                }
            }
        }
        for (i, cell_inputs) in inputs.iter().enumerate() {
            let mut sorted: Vec<usize> = cell_inputs.iter().copied().collect();
            sorted.sort_unstable();
            for j in sorted {
                dependents[j].push(i);
            }
        }

        let mut entries: Vec<usize> = (0..cells.len()).filter(|&i| inputs[i].is_empty()).collect();
        if entries.is_empty() {
            entries.push(0);
        }

        let graph = FlowGraph {
            dependents,
            inputs,
            entries,
        };
        graph.check_reachable(flow, cells)?;
        graph.check_cycles(flow, cells)?;
        Ok(graph)
    }

    pub(super) fn entries(&self) -> &[usize] {
        &self.entries
    }

    pub(super) fn dependents(&self, cell: usize) -> &[usize] {
        &self.dependents[cell]
    }

    fn check_reachable(&self, flow: &str, cells: &[FlowCell]) -> Result<(), EvalError> {
        let mut reached = vec![false; cells.len()];
        let mut pending = self.entries.clone();
        while let Some(cell) = pending.pop() {
            if !std::mem::replace(&mut reached[cell], true) {
                pending.extend(&self.dependents[cell]);
            }
        }
        let unreached: Vec<&str> = cells
            .iter()
            .zip(&reached)
            .filter(|(_, reached)| !**reached)
            .map(|(cell, _)| cell.id.as_str())
            .collect();
        if unreached.is_empty() {
            Ok(())
        } else {
            Err(invalid_flow(
                flow,
                format!("cells which have no effect: {}", unreached.join(", ")),
            ))
        }
    }

    fn check_cycles(&self, flow: &str, cells: &[FlowCell]) -> Result<(), EvalError> {
        let entries: FxHashSet<usize> = self.entries.iter().copied().collect();
        for cell in 0..cells.len() {
            let mut walk = CycleWalk {
                graph: self,
                entries: &entries,
                checked: FxHashSet::default(),
                path: FxHashSet::default(),
            };
            if let Some(mut cycle) = walk.find(cell) {
                cycle.reverse();
                let path: Vec<&str> = cycle.iter().map(|&i| cells[i].id.as_str()).collect();
                return Err(invalid_flow(
                    flow,
                    format!(
                        "cell '{}' may depend on undefined state due to cyclic dependencies [ {} ]",
                        cells[cell].id,
                        path.join(" <- ")
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Depth-first search over inputs; an entry cell breaks every cycle through
/// it because its value exists before anything else runs.
struct CycleWalk<'a> {
    graph: &'a FlowGraph,
    entries: &'a FxHashSet<usize>,
    checked: FxHashSet<usize>,
    path: FxHashSet<usize>,
}

impl CycleWalk<'_> {
    /// The cycle reached from `cell`, innermost cell first.
    fn find(&mut self, cell: usize) -> Option<Vec<usize>> {
        if self.entries.contains(&cell) || self.checked.contains(&cell) {
            return None;
        }
        if !self.path.insert(cell) {
            return Some(vec![cell]);
        }
        let mut inputs: Vec<usize> = self.graph.inputs[cell].iter().copied().collect();
        inputs.sort_unstable();
        for input in inputs {
            if let Some(mut cycle) = self.find(input) {
                cycle.push(cell);
                return Some(cycle);
            }
        }
        self.path.remove(&cell);
        self.checked.insert(cell);
        None
    }
}

//! Bidirectional dependency edges between cells.
//!
//! Tracks, for every formula cell, the cells it reads (references) and,
//! for every referenced cell, the formula cells reading it (dependents).
//! Nodes are [`Position`]s; resolving a position to an actual cell is the
//! sheet's job, so the graph never aliases cell storage.
//!
//! # Invariants
//!
//! 1. **Symmetry:** `B ∈ refs[A]` if and only if `A ∈ deps[B]`.
//! 2. **No dangling entries:** empty sets are removed, not stored.
//! 3. **No duplicate edges:** set semantics enforced by `FxHashSet`.
//! 4. **Atomic updates:** `replace_edges` is the only mutator that touches
//!    both maps.
//! 5. **Acyclicity:** callers run `would_cycle` on a candidate edge set
//!    before committing it, so the committed graph never contains a cycle.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::position::Position;

/// The aggregate of all reference edges in a sheet.
#[derive(Default, Debug, Clone)]
pub struct DepGraph {
    /// For each formula cell, the cells it reads.
    refs: FxHashMap<Position, FxHashSet<Position>>,

    /// For each referenced cell, the formula cells that read it.
    deps: FxHashMap<Position, FxHashSet<Position>>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cells `cell` reads (its outgoing edges).
    pub fn referenced(&self, cell: Position) -> impl Iterator<Item = Position> + '_ {
        self.refs
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// The cells that read `cell` (its incoming edges).
    pub fn dependents(&self, cell: Position) -> impl Iterator<Item = Position> + '_ {
        self.deps
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// Replace all outgoing edges of `cell` atomically.
    ///
    /// Removes `cell` from every old referenced cell's dependent set, then
    /// inserts reciprocal edges for the new reference set. Pass an empty
    /// set to tear down all of the cell's outgoing edges.
    pub fn replace_edges(&mut self, cell: Position, new_refs: FxHashSet<Position>) {
        if let Some(old_refs) = self.refs.remove(&cell) {
            for referenced in old_refs {
                if let Some(deps) = self.deps.get_mut(&referenced) {
                    deps.remove(&cell);
                    if deps.is_empty() {
                        self.deps.remove(&referenced);
                    }
                }
            }
        }

        if new_refs.is_empty() {
            return;
        }

        for referenced in &new_refs {
            self.deps.entry(*referenced).or_default().insert(cell);
        }
        self.refs.insert(cell, new_refs);
    }

    /// Tear down all outgoing edges of `cell` (content cleared or replaced
    /// by a non-formula). Incoming edges stay: other formulas still read
    /// this position.
    pub fn clear_cell(&mut self, cell: Position) {
        self.replace_edges(cell, FxHashSet::default());
    }

    // =========================================================================
    // Cycle detection
    // =========================================================================

    /// Would committing `candidate_refs` as the reference list of `root`
    /// close a cycle?
    ///
    /// Depth-first traversal over the committed edges, seeded from each
    /// candidate reference, iterative with an explicit stack and
    /// three-color marking so pathological reference chains cannot
    /// overflow the call stack. Reaching `root` (or any node still
    /// in-progress) is a cycle. Every outgoing edge of every unvisited
    /// node is explored: the cycle may sit behind a later-visited branch,
    /// so stopping at the first found path is unsound.
    pub fn would_cycle(&self, root: Position, candidate_refs: &[Position]) -> bool {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            InProgress,
            Done,
        }

        enum Visit {
            Enter(Position),
            Exit(Position),
        }

        let mut marks: FxHashMap<Position, Mark> = FxHashMap::default();
        let mut stack: Vec<Visit> = candidate_refs.iter().copied().map(Visit::Enter).collect();

        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Enter(pos) => {
                    if pos == root {
                        return true;
                    }
                    match marks.get(&pos) {
                        Some(Mark::InProgress) => return true,
                        Some(Mark::Done) => continue,
                        None => {}
                    }
                    marks.insert(pos, Mark::InProgress);
                    stack.push(Visit::Exit(pos));
                    stack.extend(self.referenced(pos).map(Visit::Enter));
                }
                Visit::Exit(pos) => {
                    marks.insert(pos, Mark::Done);
                }
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(row: usize, col: usize) -> Position {
        Position::new(row, col)
    }

    fn refs(list: &[Position]) -> FxHashSet<Position> {
        list.iter().copied().collect()
    }

    #[test]
    fn test_replace_edges_is_symmetric() {
        let mut g = DepGraph::new();
        let a = pos(0, 0);
        let b = pos(0, 1);
        let c = pos(0, 2);

        g.replace_edges(a, refs(&[b, c]));

        let mut referenced: Vec<_> = g.referenced(a).collect();
        referenced.sort_unstable();
        assert_eq!(referenced, vec![b, c]);
        assert_eq!(g.dependents(b).collect::<Vec<_>>(), vec![a]);
        assert_eq!(g.dependents(c).collect::<Vec<_>>(), vec![a]);
    }

    #[test]
    fn test_replace_edges_removes_stale_reciprocals() {
        let mut g = DepGraph::new();
        let a = pos(0, 0);
        let b = pos(0, 1);
        let c = pos(0, 2);

        g.replace_edges(a, refs(&[b]));
        g.replace_edges(a, refs(&[c]));

        assert_eq!(g.dependents(b).count(), 0);
        assert_eq!(g.dependents(c).collect::<Vec<_>>(), vec![a]);
        assert_eq!(g.referenced(a).collect::<Vec<_>>(), vec![c]);
    }

    #[test]
    fn test_clear_cell_keeps_incoming_edges() {
        let mut g = DepGraph::new();
        let a = pos(0, 0);
        let b = pos(0, 1);

        // a reads b, b reads nothing; then c reads a
        let c = pos(0, 2);
        g.replace_edges(a, refs(&[b]));
        g.replace_edges(c, refs(&[a]));

        g.clear_cell(a);

        assert_eq!(g.referenced(a).count(), 0);
        assert_eq!(g.dependents(b).count(), 0);
        // c still reads a
        assert_eq!(g.dependents(a).collect::<Vec<_>>(), vec![c]);
    }

    #[test]
    fn test_would_cycle_direct_self_reference() {
        let g = DepGraph::new();
        let a = pos(0, 0);
        assert!(g.would_cycle(a, &[a]));
    }

    #[test]
    fn test_would_cycle_transitive() {
        let mut g = DepGraph::new();
        let a = pos(0, 0);
        let b = pos(0, 1);
        let c = pos(0, 2);

        g.replace_edges(b, refs(&[c]));
        g.replace_edges(c, refs(&[a]));

        // a -> b -> c -> a
        assert!(g.would_cycle(a, &[b]));
        // d -> b is fine
        assert!(!g.would_cycle(pos(1, 0), &[b]));
    }

    #[test]
    fn test_would_cycle_explores_all_branches() {
        let mut g = DepGraph::new();
        let a = pos(0, 0);
        let b = pos(0, 1);
        let c = pos(0, 2);
        let d = pos(0, 3);

        // b is a dead end; the path back to a goes through c -> d -> a
        g.replace_edges(c, refs(&[d]));
        g.replace_edges(d, refs(&[a]));

        assert!(g.would_cycle(a, &[b, c]));
        assert!(g.would_cycle(a, &[c, b]));
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let mut g = DepGraph::new();
        let a = pos(0, 0);
        let b = pos(0, 1);
        let c = pos(0, 2);
        let d = pos(0, 3);

        // b and c both read d
        g.replace_edges(b, refs(&[d]));
        g.replace_edges(c, refs(&[d]));

        assert!(!g.would_cycle(a, &[b, c]));
    }
}

//! The sheet: grid storage, mutation orchestration, cache invalidation.
//!
//! All cross-cell traffic goes through the sheet. A content edit builds a
//! candidate representation first, runs cycle detection against the
//! candidate's references, and only then touches any state: on rejection
//! the grid, edges, and caches are exactly as before the call.
//!
//! The grid auto-grows (rows, then that row's columns) and never shrinks.
//! Cells are never removed from their slot once created, only reset to
//! Empty, so dependent edges can keep pointing at a cleared position.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::cell::{Cell, CellContent};
use crate::dep_graph::DepGraph;
use crate::error::{SheetResult, SpreadsheetError};
use crate::formula::eval::CellLookup;
use crate::position::Position;
use crate::value::{CellError, Value};

/// The printable bounding box of a sheet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub rows: usize,
    pub cols: usize,
}

/// A sparse, auto-growing grid of cells with live dependency tracking.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sheet {
    grid: Vec<Vec<Option<Cell>>>,

    /// Reference edges between cells. Derived state: rebuilt from formulas
    /// after deserialization, see [`Sheet::rebuild_dep_graph`].
    #[serde(skip)]
    dep_graph: DepGraph,
}

impl Sheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the content of the cell at `pos` from raw input text.
    ///
    /// Empty text resets to Empty, text starting with `=` (and longer than
    /// one character) becomes a formula, anything else is literal text.
    /// The edit is all-or-nothing: an invalid position, a formula syntax
    /// error, or a circular reference leaves the sheet untouched.
    pub fn set_cell(&mut self, pos: Position, text: &str) -> SheetResult<()> {
        self.check_position(pos)?;

        let content = CellContent::from_raw(text).map_err(SpreadsheetError::FormulaSyntax)?;
        let refs = content.referenced_positions().to_vec();

        if self.dep_graph.would_cycle(pos, &refs) {
            debug!(%pos, "rejected edit: circular dependency");
            return Err(SpreadsheetError::CircularDependency(pos));
        }

        // Commit: from here on nothing can fail.
        for &referenced in &refs {
            self.materialize(referenced);
        }
        self.materialize(pos).set_content(content);
        self.dep_graph
            .replace_edges(pos, refs.iter().copied().collect::<FxHashSet<_>>());
        self.invalidate_dependents(pos);

        debug!(%pos, refs = refs.len(), "committed cell edit");
        Ok(())
    }

    /// The cell at `pos`, if one has ever been created there.
    ///
    /// A validly shaped position beyond the current grid extent is
    /// `Ok(None)`; a structurally invalid position is an error.
    pub fn get_cell(&self, pos: Position) -> SheetResult<Option<&Cell>> {
        self.check_position(pos)?;
        Ok(self.cell_at(pos))
    }

    /// Reset the cell at `pos` to Empty.
    ///
    /// The cell stays addressable in the grid (other formulas may read
    /// it); its outgoing edges are torn down and its dependents' caches
    /// invalidated. Clearing a position that holds no cell is a no-op.
    pub fn clear_cell(&mut self, pos: Position) -> SheetResult<()> {
        self.check_position(pos)?;

        let Some(row) = self.grid.get_mut(pos.row) else {
            return Ok(());
        };
        let Some(Some(cell)) = row.get_mut(pos.col) else {
            return Ok(());
        };

        cell.set_content(CellContent::Empty);
        self.dep_graph.clear_cell(pos);
        self.invalidate_dependents(pos);

        debug!(%pos, "cleared cell");
        Ok(())
    }

    /// The computed value at `pos`. Absent cells read as the empty value.
    pub fn value(&self, pos: Position) -> SheetResult<Value> {
        self.check_position(pos)?;
        Ok(match self.cell_at(pos) {
            Some(cell) => cell.value(self),
            None => Value::empty(),
        })
    }

    /// The raw text at `pos`. Absent cells read as empty text.
    pub fn text(&self, pos: Position) -> SheetResult<String> {
        self.check_position(pos)?;
        Ok(match self.cell_at(pos) {
            Some(cell) => cell.text(),
            None => String::new(),
        })
    }

    /// The positions the cell at `pos` reads, sorted.
    pub fn referenced_cells(&self, pos: Position) -> Vec<Position> {
        let mut out: Vec<_> = self.dep_graph.referenced(pos).collect();
        out.sort_unstable();
        out
    }

    /// The positions whose formulas read the cell at `pos`, sorted.
    pub fn dependent_cells(&self, pos: Position) -> Vec<Position> {
        let mut out: Vec<_> = self.dep_graph.dependents(pos).collect();
        out.sort_unstable();
        out
    }

    // =========================================================================
    // Printable size and rendering
    // =========================================================================

    /// The smallest bounding rectangle covering every cell with non-empty
    /// text. Derived by scanning from the grid extent inward; a cell that
    /// exists but holds empty text does not count.
    pub fn printable_size(&self) -> Size {
        let mut size = Size::default();
        for (row, cells) in self.grid.iter().enumerate() {
            for (col, slot) in cells.iter().enumerate().rev() {
                let populated = slot
                    .as_ref()
                    .is_some_and(|cell| !matches!(cell.content(), CellContent::Empty));
                if populated {
                    size.rows = size.rows.max(row + 1);
                    size.cols = size.cols.max(col + 1);
                    break;
                }
            }
        }
        size
    }

    /// Render every computed value inside the printable bounds,
    /// tab-separated, one line per row.
    pub fn render_values(&self) -> String {
        self.render_with(|cell| cell.value(self).to_string())
    }

    /// Render every raw cell text inside the printable bounds,
    /// tab-separated, one line per row.
    pub fn render_texts(&self) -> String {
        self.render_with(|cell| cell.text())
    }

    fn render_with(&self, mut render: impl FnMut(&Cell) -> String) -> String {
        let size = self.printable_size();
        let mut out = String::new();
        for row in 0..size.rows {
            for col in 0..size.cols {
                if col > 0 {
                    out.push('\t');
                }
                if let Some(cell) = self.cell_at(Position::new(row, col)) {
                    out.push_str(&render(cell));
                }
            }
            out.push('\n');
        }
        out
    }

    // =========================================================================
    // Dependency graph maintenance
    // =========================================================================

    /// Rebuild all reference edges from the formulas in the grid.
    ///
    /// Call after deserializing a sheet: the graph is derived state and is
    /// not persisted. Also materializes placeholder cells for referenced
    /// positions, restoring the same shape `set_cell` would have produced.
    ///
    /// Loaded data can contain reference cycles the live edit path
    /// rejects. Evaluating into one would recurse without bound, so every
    /// formula cell whose references reach a cycle is marked with a
    /// `#CYCLE!` error instead; editing a cell to break the cycle
    /// invalidates the markers like any other stale cache.
    pub fn rebuild_dep_graph(&mut self) {
        self.dep_graph = DepGraph::new();

        let mut formula_refs: Vec<(Position, Vec<Position>)> = Vec::new();
        for (row, cells) in self.grid.iter().enumerate() {
            for (col, slot) in cells.iter().enumerate() {
                if let Some(cell) = slot {
                    let refs = cell.referenced_positions();
                    if !refs.is_empty() {
                        formula_refs.push((Position::new(row, col), refs.to_vec()));
                    }
                }
            }
        }

        for (pos, refs) in &formula_refs {
            for &referenced in refs {
                self.materialize(referenced);
            }
            self.dep_graph
                .replace_edges(*pos, refs.iter().copied().collect::<FxHashSet<_>>());
        }

        let mut cycles = 0usize;
        for (pos, refs) in &formula_refs {
            if self.dep_graph.would_cycle(*pos, refs) {
                if let Some(cell) = self.cell_at(*pos) {
                    cell.mark_cycle_error();
                    cycles += 1;
                }
            }
        }
        if cycles > 0 {
            debug!(cycles, "marked cells reaching a reference cycle");
        }
    }

    /// Clear the caches of everything transitively dependent on `root`.
    ///
    /// The walk does not recurse past a dependent whose cache is already
    /// empty: an empty cache means the walk that cleared it already
    /// cleared everything further downstream. That short-circuit keeps the
    /// cost proportional to the currently cached dependents touched, and
    /// it stays sound because invalidation always runs to completion
    /// before any mutation returns.
    fn invalidate_dependents(&self, root: Position) {
        let mut stack: Vec<Position> = self.dep_graph.dependents(root).collect();
        let mut cleared = 0usize;

        while let Some(pos) = stack.pop() {
            let Some(cell) = self.cell_at(pos) else {
                continue;
            };
            if cell.is_cached() {
                cell.invalidate();
                cleared += 1;
                stack.extend(self.dep_graph.dependents(pos));
            }
        }

        trace!(%root, cleared, "invalidated dependent caches");
    }

    // =========================================================================
    // Grid plumbing
    // =========================================================================

    fn check_position(&self, pos: Position) -> SheetResult<()> {
        if pos.is_valid() {
            Ok(())
        } else {
            Err(SpreadsheetError::InvalidPosition(pos))
        }
    }

    fn cell_at(&self, pos: Position) -> Option<&Cell> {
        self.grid.get(pos.row)?.get(pos.col)?.as_ref()
    }

    /// Grow the grid to hold `pos` and return its cell, creating an Empty
    /// placeholder if none exists. This is the only way a cell comes into
    /// existence.
    fn materialize(&mut self, pos: Position) -> &mut Cell {
        if self.grid.len() <= pos.row {
            self.grid.resize_with(pos.row + 1, Vec::new);
        }
        let row = &mut self.grid[pos.row];
        if row.len() <= pos.col {
            row.resize_with(pos.col + 1, || None);
        }
        row[pos.col].get_or_insert_with(Cell::new)
    }
}

impl CellLookup for Sheet {
    fn number_at(&self, pos: Position) -> Result<f64, CellError> {
        if !pos.is_valid() {
            return Err(CellError::Ref);
        }
        let Some(cell) = self.cell_at(pos) else {
            return Ok(0.0);
        };
        match cell.value(self) {
            Value::Number(n) => Ok(n),
            Value::Text(s) if s.is_empty() => Ok(0.0),
            Value::Text(s) => s.trim().parse::<f64>().map_err(|_| CellError::Value),
            Value::Error(e) => Err(e),
        }
    }
}

//! Structural error types.
//!
//! These are surfaced to the caller of a mutation and are never stored in
//! the grid. Every one of them is all-or-nothing: when a mutation returns
//! an error, the sheet's cells and edges are exactly as they were before
//! the call. Evaluation errors (`#REF!` and friends) are a different
//! family, see [`crate::value::CellError`].

use thiserror::Error;

use crate::position::Position;

/// Result type for sheet operations.
pub type SheetResult<T> = std::result::Result<T, SpreadsheetError>;

/// Errors that abort a sheet operation without changing any state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpreadsheetError {
    /// The position is outside the fixed sheet bounds.
    #[error("invalid position {0}")]
    InvalidPosition(Position),

    /// The text looked like a formula but did not parse.
    #[error("formula syntax error: {0}")]
    FormulaSyntax(String),

    /// Committing the formula would let the cell depend on itself.
    #[error("circular dependency at {0}")]
    CircularDependency(Position),
}

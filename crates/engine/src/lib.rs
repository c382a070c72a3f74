//! Incremental spreadsheet evaluation core.
//!
//! This crate maintains a grid of cells together with the live reference
//! graph between formula cells and the cells they read:
//!
//! - [`position`] - validated (row, col) coordinates and A1 notation
//! - [`value`] - the number / text / error value model
//! - [`cell`] - Empty/Text/Formula cell content with a lazily computed cache
//! - [`dep_graph`] - bidirectional reference edges and cycle detection
//! - [`formula`] - formula parsing and numeric evaluation
//! - [`sheet`] - the grid, mutation orchestration, and cache invalidation
//!
//! Mutations are all-or-nothing: an edit that would introduce a circular
//! reference (or fails to parse) leaves the sheet untouched.

pub mod cell;
pub mod dep_graph;
pub mod error;
pub mod formula;
pub mod position;
pub mod sheet;
pub mod value;

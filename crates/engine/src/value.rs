//! The cell value model.
//!
//! A computed value is exactly one of number, text, or evaluation error.
//! Errors are ordinary values once produced by evaluation: they are stored
//! in caches and propagate through formula composition, unlike the
//! structural errors in [`crate::error`] which abort a mutation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Evaluation-error categories stored inside a [`Value`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellError {
    /// A formula referenced a position outside the sheet bounds.
    Ref,
    /// An operand's text could not be interpreted as a number.
    Value,
    /// Division by zero.
    Div0,
    /// The cell sits on (or reads into) a reference cycle. Live edits
    /// reject cycles up front, so this only arises from loaded data.
    Cycle,
}

impl CellError {
    /// The display code for this error category.
    pub fn code(&self) -> &'static str {
        match self {
            CellError::Ref => "#REF!",
            CellError::Value => "#VALUE!",
            CellError::Div0 => "#DIV/0!",
            CellError::Cycle => "#CYCLE!",
        }
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A computed cell value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Number(f64),
    Text(String),
    Error(CellError),
}

impl Value {
    /// The value an empty cell reads as.
    pub fn empty() -> Self {
        Value::Text(String::new())
    }

    /// True if this value renders as empty text.
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Text(s) if s.is_empty())
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::empty()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Value::Text(s) => f.write_str(s),
            Value::Error(e) => write!(f, "{e}"),
        }
    }
}

// Formula evaluator - numeric evaluation against a cell lookup

use crate::position::Position;
use crate::value::{CellError, Value};

use super::parser::{Expr, Formula, Op};

/// Read access to cell values during evaluation.
pub trait CellLookup {
    /// The numeric reading of the cell at `pos`:
    /// - an invalid position is `Err(Ref)`
    /// - an absent or empty cell is `0.0`
    /// - text that parses as a number is that number, otherwise `Err(Value)`
    /// - a stored error value propagates unchanged
    fn number_at(&self, pos: Position) -> Result<f64, CellError>;
}

impl Formula {
    /// Evaluate against `lookup`. Evaluation errors come back as
    /// `Value::Error`, never as a Rust error.
    pub fn evaluate(&self, lookup: &dyn CellLookup) -> Value {
        match eval_expr(self.expr(), lookup) {
            Ok(n) => Value::Number(n),
            Err(e) => Value::Error(e),
        }
    }
}

fn eval_expr(expr: &Expr, lookup: &dyn CellLookup) -> Result<f64, CellError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::Ref(pos) => {
            if !pos.is_valid() {
                return Err(CellError::Ref);
            }
            lookup.number_at(*pos)
        }
        Expr::Neg(inner) => Ok(-eval_expr(inner, lookup)?),
        Expr::BinaryOp { op, left, right } => {
            let lhs = eval_expr(left, lookup)?;
            let rhs = eval_expr(right, lookup)?;
            match op {
                Op::Add => Ok(lhs + rhs),
                Op::Sub => Ok(lhs - rhs),
                Op::Mul => Ok(lhs * rhs),
                Op::Div => {
                    if rhs == 0.0 {
                        Err(CellError::Div0)
                    } else {
                        Ok(lhs / rhs)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::MAX_ROWS;
    use std::collections::HashMap;

    /// Lookup backed by a plain map; unmapped cells read as 0.
    struct MapLookup(HashMap<Position, Result<f64, CellError>>);

    impl MapLookup {
        fn new() -> Self {
            Self(HashMap::new())
        }

        fn with(mut self, a1: &str, entry: Result<f64, CellError>) -> Self {
            self.0.insert(Position::parse_a1(a1).unwrap(), entry);
            self
        }
    }

    impl CellLookup for MapLookup {
        fn number_at(&self, pos: Position) -> Result<f64, CellError> {
            self.0.get(&pos).cloned().unwrap_or(Ok(0.0))
        }
    }

    fn eval(src: &str, lookup: &dyn CellLookup) -> Value {
        Formula::parse(src).unwrap().evaluate(lookup)
    }

    #[test]
    fn test_arithmetic() {
        let lookup = MapLookup::new();
        assert_eq!(eval("1+2*3", &lookup), Value::Number(7.0));
        assert_eq!(eval("(1+2)*3", &lookup), Value::Number(9.0));
        assert_eq!(eval("-4/2", &lookup), Value::Number(-2.0));
        assert_eq!(eval("2-0.5", &lookup), Value::Number(1.5));
    }

    #[test]
    fn test_division_by_zero() {
        let lookup = MapLookup::new();
        assert_eq!(eval("1/0", &lookup), Value::Error(CellError::Div0));
        assert_eq!(eval("1/(2-2)", &lookup), Value::Error(CellError::Div0));
    }

    #[test]
    fn test_cell_reads() {
        let lookup = MapLookup::new().with("A1", Ok(5.0));
        assert_eq!(eval("A1+1", &lookup), Value::Number(6.0));
        // Absent cell reads as zero
        assert_eq!(eval("B7+1", &lookup), Value::Number(1.0));
    }

    #[test]
    fn test_error_propagation() {
        let lookup = MapLookup::new()
            .with("A1", Err(CellError::Value))
            .with("A2", Err(CellError::Div0));
        assert_eq!(eval("A1+1", &lookup), Value::Error(CellError::Value));
        assert_eq!(eval("2*A2", &lookup), Value::Error(CellError::Div0));
    }

    #[test]
    fn test_out_of_bounds_ref_is_ref_error() {
        let lookup = MapLookup::new();
        let src = format!("A{}+1", MAX_ROWS + 1);
        assert_eq!(eval(&src, &lookup), Value::Error(CellError::Ref));
    }
}

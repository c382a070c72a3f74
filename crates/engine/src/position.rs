//! Cell positions and A1 notation.
//!
//! A `Position` identifies a cell by zero-based (row, column) coordinates.
//! Positions are value types: equality, hashing, and ordering are by
//! coordinate pair. Validity is a pure predicate, not a constructor
//! invariant, so formulas can carry out-of-range references that surface
//! as `#REF!` only when evaluated.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum number of rows a sheet can address.
pub const MAX_ROWS: usize = 16_384;
/// Maximum number of columns a sheet can address.
pub const MAX_COLS: usize = 16_384;

/// A (row, column) cell coordinate, zero-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    #[inline]
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// True if this position fits inside the fixed sheet bounds.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.row < MAX_ROWS && self.col < MAX_COLS
    }

    /// Parse an A1-style reference (e.g. `A1`, `b2`, `AA100`).
    ///
    /// Returns `None` for anything that is not letters followed by a
    /// one-based row number, or when the coordinates overflow.
    pub fn parse_a1(name: &str) -> Option<Position> {
        let letters_len = name
            .bytes()
            .take_while(|b| b.is_ascii_alphabetic())
            .count();
        if letters_len == 0 || letters_len == name.len() {
            return None;
        }
        let (letters, digits) = name.split_at(letters_len);
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let mut col = 0usize;
        for b in letters.bytes() {
            let digit = (b.to_ascii_uppercase() - b'A') as usize + 1;
            col = col.checked_mul(26)?.checked_add(digit)?;
        }
        let col = col - 1;

        let row = digits.parse::<usize>().ok()?.checked_sub(1)?;

        Some(Position::new(row, col))
    }

    /// Convert a zero-based column index to column letters (0 -> A, 26 -> AA).
    pub fn col_to_letters(col: usize) -> String {
        let mut result = String::new();
        let mut n = col;
        loop {
            result.insert(0, (b'A' + (n % 26) as u8) as char);
            if n < 26 {
                break;
            }
            n = n / 26 - 1;
        }
        result
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Position::col_to_letters(self.col), self.row + 1)
    }
}

impl std::str::FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::parse_a1(s).ok_or_else(|| format!("invalid cell reference: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_col_to_letters() {
        assert_eq!(Position::col_to_letters(0), "A");
        assert_eq!(Position::col_to_letters(1), "B");
        assert_eq!(Position::col_to_letters(25), "Z");
        assert_eq!(Position::col_to_letters(26), "AA");
        assert_eq!(Position::col_to_letters(27), "AB");
        assert_eq!(Position::col_to_letters(701), "ZZ");
        assert_eq!(Position::col_to_letters(702), "AAA");
    }

    #[test]
    fn test_parse_a1() {
        assert_eq!(Position::parse_a1("A1"), Some(Position::new(0, 0)));
        assert_eq!(Position::parse_a1("b3"), Some(Position::new(2, 1)));
        assert_eq!(Position::parse_a1("AA10"), Some(Position::new(9, 26)));
        assert_eq!(Position::parse_a1("A0"), None);
        assert_eq!(Position::parse_a1("1A"), None);
        assert_eq!(Position::parse_a1("A"), None);
        assert_eq!(Position::parse_a1("12"), None);
        assert_eq!(Position::parse_a1(""), None);
        assert_eq!(Position::parse_a1("A1B"), None);
    }

    #[test]
    fn test_parse_a1_overflow_returns_none() {
        let huge = format!("{}1", "Z".repeat(40));
        assert_eq!(Position::parse_a1(&huge), None);
    }

    #[test]
    fn test_validity_bounds() {
        assert!(Position::new(0, 0).is_valid());
        assert!(Position::new(MAX_ROWS - 1, MAX_COLS - 1).is_valid());
        assert!(!Position::new(MAX_ROWS, 0).is_valid());
        assert!(!Position::new(0, MAX_COLS).is_valid());
    }

    #[test]
    fn test_display() {
        assert_eq!(Position::new(0, 0).to_string(), "A1");
        assert_eq!(Position::new(9, 26).to_string(), "AA10");
    }

    #[test]
    fn test_ordering_is_row_major() {
        assert!(Position::new(0, 5) < Position::new(1, 0));
        assert!(Position::new(2, 1) < Position::new(2, 3));
    }

    proptest! {
        #[test]
        fn prop_display_parse_roundtrip(row in 0..MAX_ROWS, col in 0..MAX_COLS) {
            let pos = Position::new(row, col);
            prop_assert_eq!(Position::parse_a1(&pos.to_string()), Some(pos));
        }
    }
}

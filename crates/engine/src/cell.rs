//! Cell content and the lazily computed value cache.
//!
//! A cell holds one of three representations: Empty, literal Text, or a
//! parsed Formula. Only the Formula representation carries cache state.
//! `value()` is a read accessor that may populate the cache on first use;
//! the cache lives in a `RefCell` because the whole engine is
//! single-threaded and externally synchronized (there is no parallelism to
//! guard against).
//!
//! Reference/dependent edges are NOT stored here: they are positions keyed
//! in the sheet's dependency graph, so cells never hold aliasing pointers
//! at each other.

use std::cell::RefCell;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::formula::eval::CellLookup;
use crate::formula::parser::Formula;
use crate::position::Position;
use crate::value::{CellError, Value};

/// Leading marker denoting a formula.
pub const FORMULA_MARKER: char = '=';
/// Leading marker escaping literal text that would otherwise be a formula.
pub const ESCAPE_MARKER: char = '\'';

/// The three cell representations.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CellContent {
    #[default]
    Empty,
    Text(String),
    Formula(Formula),
}

impl CellContent {
    /// Build content from raw input text.
    ///
    /// - empty text is Empty
    /// - `=` followed by at least one character parses as a formula; a
    ///   parse failure is returned without constructing anything
    /// - everything else (including a lone `=`) is literal Text, stored
    ///   verbatim
    pub fn from_raw(text: &str) -> Result<CellContent, String> {
        if text.is_empty() {
            Ok(CellContent::Empty)
        } else if text.len() > 1 && text.starts_with(FORMULA_MARKER) {
            Ok(CellContent::Formula(Formula::parse(&text[1..])?))
        } else {
            Ok(CellContent::Text(text.to_string()))
        }
    }

    /// The positions this content reads. Empty for non-formula content.
    pub fn referenced_positions(&self) -> &[Position] {
        match self {
            CellContent::Formula(f) => f.referenced_positions(),
            _ => &[],
        }
    }
}

/// A grid cell: content plus the formula value cache.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    content: CellContent,
    cache: RefCell<Option<Value>>,
}

impl Cell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(content: CellContent) -> Self {
        Self {
            content,
            cache: RefCell::new(None),
        }
    }

    pub fn content(&self) -> &CellContent {
        &self.content
    }

    /// Replace the representation wholesale. The cache starts empty.
    pub fn set_content(&mut self, content: CellContent) {
        self.content = content;
        *self.cache.get_mut() = None;
    }

    /// The raw text of the cell: empty for Empty, verbatim (escape marker
    /// included) for Text, `=` plus canonical expression for Formula.
    pub fn text(&self) -> String {
        match &self.content {
            CellContent::Empty => String::new(),
            CellContent::Text(s) => s.clone(),
            CellContent::Formula(f) => format!("{}{}", FORMULA_MARKER, f.expression()),
        }
    }

    /// The computed value.
    ///
    /// Text strips a single leading escape marker; a Formula returns its
    /// cached value when present and otherwise evaluates through `lookup`,
    /// caching the result. Evaluation errors are cached like any value.
    pub fn value(&self, lookup: &dyn CellLookup) -> Value {
        match &self.content {
            CellContent::Empty => Value::empty(),
            CellContent::Text(s) => match s.strip_prefix(ESCAPE_MARKER) {
                Some(rest) => Value::Text(rest.to_string()),
                None => Value::Text(s.clone()),
            },
            CellContent::Formula(f) => {
                if let Some(v) = &*self.cache.borrow() {
                    return v.clone();
                }
                let v = f.evaluate(lookup);
                *self.cache.borrow_mut() = Some(v.clone());
                v
            }
        }
    }

    /// True if a computed value is currently cached.
    pub fn is_cached(&self) -> bool {
        self.cache.borrow().is_some()
    }

    /// The cached value, if any, without triggering evaluation.
    pub fn cached_value(&self) -> Option<Value> {
        self.cache.borrow().clone()
    }

    /// Drop the cached value; the next read recomputes.
    ///
    /// Crate-internal: an empty cache means everything downstream was
    /// already invalidated, so single caches must only be cleared from
    /// the sheet's dependent walk.
    pub(crate) fn invalidate(&self) {
        self.cache.borrow_mut().take();
    }

    /// Mark a formula cell whose evaluation would enter a reference
    /// cycle. The marker occupies the cache, so reads return it instead
    /// of recursing through the cycle.
    pub(crate) fn mark_cycle_error(&self) {
        if matches!(self.content, CellContent::Formula(_)) {
            *self.cache.borrow_mut() = Some(Value::Error(CellError::Cycle));
        }
    }

    /// The positions this cell's formula reads.
    pub fn referenced_positions(&self) -> &[Position] {
        self.content.referenced_positions()
    }
}

// Cells serialize as their raw text; caches and edges are derived state
// and get rebuilt after load (see `Sheet::rebuild_dep_graph`).
impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text())
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let content = CellContent::from_raw(&raw).map_err(D::Error::custom)?;
        Ok(Cell::with_content(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Lookup where every cell reads as a fixed number, counting reads.
    struct CountingLookup {
        n: f64,
        reads: RefCell<usize>,
    }

    impl CountingLookup {
        fn new(n: f64) -> Self {
            Self {
                n,
                reads: RefCell::new(0),
            }
        }
    }

    impl CellLookup for CountingLookup {
        fn number_at(&self, _pos: Position) -> Result<f64, CellError> {
            *self.reads.borrow_mut() += 1;
            Ok(self.n)
        }
    }

    fn formula_cell(src: &str) -> Cell {
        Cell::with_content(CellContent::from_raw(src).unwrap())
    }

    #[test]
    fn test_from_raw_dispatch() {
        assert!(matches!(
            CellContent::from_raw("").unwrap(),
            CellContent::Empty
        ));
        assert!(matches!(
            CellContent::from_raw("hello").unwrap(),
            CellContent::Text(_)
        ));
        assert!(matches!(
            CellContent::from_raw("=A1").unwrap(),
            CellContent::Formula(_)
        ));
        // A lone marker is literal text, not an empty formula
        assert!(matches!(
            CellContent::from_raw("=").unwrap(),
            CellContent::Text(_)
        ));
        assert!(CellContent::from_raw("=1+").is_err());
    }

    #[test]
    fn test_escape_marker_stripped_from_value_only() {
        let cell = Cell::with_content(CellContent::from_raw("'=A1+1").unwrap());
        let lookup = CountingLookup::new(0.0);
        assert_eq!(cell.value(&lookup), Value::Text("=A1+1".to_string()));
        assert_eq!(cell.text(), "'=A1+1");
        // Not evaluated: it is literal text
        assert_eq!(*lookup.reads.borrow(), 0);
    }

    #[test]
    fn test_formula_text_is_canonical() {
        let cell = formula_cell("= 1 +  A1 ");
        assert_eq!(cell.text(), "=1+A1");
    }

    #[test]
    fn test_value_is_cached_until_invalidated() {
        let cell = formula_cell("=A1+1");
        let lookup = CountingLookup::new(5.0);

        assert!(!cell.is_cached());
        assert_eq!(cell.value(&lookup), Value::Number(6.0));
        assert!(cell.is_cached());
        assert_eq!(cell.value(&lookup), Value::Number(6.0));
        // Second read served from cache
        assert_eq!(*lookup.reads.borrow(), 1);

        cell.invalidate();
        assert!(!cell.is_cached());
        assert_eq!(cell.value(&lookup), Value::Number(6.0));
        assert_eq!(*lookup.reads.borrow(), 2);
    }

    #[test]
    fn test_evaluation_error_is_cached_as_value() {
        let cell = formula_cell("=1/0");
        let lookup = CountingLookup::new(0.0);
        assert_eq!(cell.value(&lookup), Value::Error(CellError::Div0));
        assert_eq!(cell.cached_value(), Some(Value::Error(CellError::Div0)));
    }

    #[test]
    fn test_cycle_marker_takes_the_cache() {
        let cell = formula_cell("=A1");
        let lookup = CountingLookup::new(5.0);
        cell.mark_cycle_error();
        // The marker is served like any cached value, no evaluation
        assert_eq!(cell.value(&lookup), Value::Error(CellError::Cycle));
        assert_eq!(*lookup.reads.borrow(), 0);

        cell.invalidate();
        assert_eq!(cell.value(&lookup), Value::Number(5.0));
    }

    #[test]
    fn test_set_content_clears_cache() {
        let mut cell = formula_cell("=1+1");
        let lookup = CountingLookup::new(0.0);
        let _ = cell.value(&lookup);
        assert!(cell.is_cached());

        cell.set_content(CellContent::from_raw("=2+2").unwrap());
        assert!(!cell.is_cached());
        assert_eq!(cell.value(&lookup), Value::Number(4.0));
    }

    #[test]
    fn test_serde_roundtrip_preserves_text() {
        let cell = formula_cell("=A1*2");
        let json = serde_json::to_string(&cell).unwrap();
        assert_eq!(json, "\"=A1*2\"");
        let back: Cell = serde_json::from_str(&json).unwrap();
        assert_eq!(back.text(), "=A1*2");
        assert!(!back.is_cached());
    }
}

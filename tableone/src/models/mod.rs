//! Domain models for the tableone pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`Dataset`] - Ordered, uniquely named columns of equal length
//! - [`Column`] - One named sequence of cells, with optional level order
//! - [`Cell`] - A single scalar value (number, text or missing)
//! - [`ColumnType`] - Inferred storage type of a column

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use crate::error::{ConfigResult, ConfigurationError};

// =============================================================================
// Cell
// =============================================================================

/// A single value in the dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// Numeric measurement.
    Number(f64),
    /// Categorical or free text value.
    Text(String),
    /// Absent value (empty field or a missing token such as `NA`).
    Missing,
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Key used when this cell is treated as a categorical level.
    ///
    /// Integral numbers print without a fractional part so `1` and `1.0`
    /// land in the same level.
    pub fn level_key(&self) -> Option<String> {
        match self {
            Cell::Number(v) => Some(format_number(*v)),
            Cell::Text(s) => Some(s.clone()),
            Cell::Missing => None,
        }
    }

    /// Ordering used for undeclared levels: numbers first by value, then text.
    pub fn level_cmp(&self, other: &Cell) -> Ordering {
        match (self, other) {
            (Cell::Number(a), Cell::Number(b)) => a.total_cmp(b),
            (Cell::Number(_), _) => Ordering::Less,
            (_, Cell::Number(_)) => Ordering::Greater,
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            (Cell::Text(_), Cell::Missing) => Ordering::Less,
            (Cell::Missing, Cell::Text(_)) => Ordering::Greater,
            (Cell::Missing, Cell::Missing) => Ordering::Equal,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(v) => write!(f, "{}", format_number(*v)),
            Cell::Text(s) => write!(f, "{s}"),
            Cell::Missing => Ok(()),
        }
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Number(v)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Cell::Missing)
    }
}

fn format_number(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

// =============================================================================
// Column
// =============================================================================

/// Storage type of a column, inferred from its non-missing cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    Text,
    /// Every cell is missing.
    Empty,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Numeric => write!(f, "numeric"),
            ColumnType::Text => write!(f, "text"),
            ColumnType::Empty => write!(f, "empty"),
        }
    }
}

/// A named column of cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Cell>,
    /// Declared level order (set for derived categorical columns).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub levels: Option<Vec<String>>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            cells,
            levels: None,
        }
    }

    /// Attach a declared level order.
    pub fn with_levels(mut self, levels: Vec<String>) -> Self {
        self.levels = Some(levels);
        self
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn column_type(&self) -> ColumnType {
        let mut saw_number = false;
        for cell in &self.cells {
            match cell {
                Cell::Text(_) => return ColumnType::Text,
                Cell::Number(_) => saw_number = true,
                Cell::Missing => {}
            }
        }
        if saw_number {
            ColumnType::Numeric
        } else {
            ColumnType::Empty
        }
    }

    pub fn missing_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_missing()).count()
    }

    /// Distinct non-missing level keys, in level order.
    ///
    /// Declared levels come first in their declared order; values that are
    /// not declared follow, sorted.
    pub fn distinct_levels(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut observed: Vec<&Cell> = Vec::new();
        for cell in &self.cells {
            if let Some(key) = cell.level_key() {
                if seen.insert(key) {
                    observed.push(cell);
                }
            }
        }
        observed.sort_by(|a, b| a.level_cmp(b));

        let mut levels: Vec<String> = self.levels.clone().unwrap_or_default();
        for cell in observed {
            if let Some(key) = cell.level_key() {
                if !levels.contains(&key) {
                    levels.push(key);
                }
            }
        }
        levels
    }
}

// =============================================================================
// Dataset
// =============================================================================

/// An ordered collection of named columns sharing one row count.
///
/// The invariant is enforced on construction; a `Dataset` is never mutated
/// in place, derived columns produce a new value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    columns: Vec<Column>,
    row_count: usize,
}

impl Dataset {
    /// Build a dataset, checking unique names and equal lengths.
    pub fn new(columns: Vec<Column>) -> ConfigResult<Self> {
        let row_count = columns.first().map(Column::len).unwrap_or(0);
        let mut names = HashSet::new();
        for column in &columns {
            if !names.insert(column.name.as_str()) {
                return Err(ConfigurationError::DuplicateColumn(column.name.clone()));
            }
            if column.len() != row_count {
                return Err(ConfigurationError::LengthMismatch {
                    column: column.name.clone(),
                    expected: row_count,
                    found: column.len(),
                });
            }
        }
        Ok(Self { columns, row_count })
    }

    /// Build a dataset from row-major data.
    ///
    /// Short rows are padded with missing cells; extra cells are ignored.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> ConfigResult<Self> {
        let mut columns: Vec<Column> = headers
            .into_iter()
            .map(|h| Column::new(h, Vec::with_capacity(rows.len())))
            .collect();

        for row in rows {
            let mut cells = row.into_iter();
            for column in columns.iter_mut() {
                column.cells.push(cells.next().unwrap_or(Cell::Missing));
            }
        }

        Self::new(columns)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a column, failing with [`ConfigurationError::UnknownColumn`].
    pub fn require_column(&self, name: &str) -> ConfigResult<&Column> {
        self.column(name)
            .ok_or_else(|| ConfigurationError::UnknownColumn(name.to_string()))
    }

    /// Return a new dataset with `column` appended.
    pub fn with_column(&self, column: Column) -> ConfigResult<Dataset> {
        if self.column(&column.name).is_some() {
            return Err(ConfigurationError::DuplicateColumn(column.name));
        }
        if !self.columns.is_empty() && column.len() != self.row_count {
            let found = column.len();
            return Err(ConfigurationError::LengthMismatch {
                column: column.name,
                expected: self.row_count,
                found,
            });
        }
        let mut columns = self.columns.clone();
        columns.push(column);
        Dataset::new(columns)
    }

    /// Cells of one row, in column order.
    pub fn row(&self, index: usize) -> Option<Vec<&Cell>> {
        if index >= self.row_count {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.cells[index]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nums(values: &[f64]) -> Vec<Cell> {
        values.iter().map(|v| Cell::Number(*v)).collect()
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let result = Dataset::new(vec![
            Column::new("age", nums(&[21.0, 30.0])),
            Column::new("mass", nums(&[28.1])),
        ]);
        match result {
            Err(ConfigurationError::LengthMismatch { column, expected, found }) => {
                assert_eq!(column, "mass");
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("expected length mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let result = Dataset::new(vec![
            Column::new("age", nums(&[21.0])),
            Column::new("age", nums(&[30.0])),
        ]);
        assert!(matches!(result, Err(ConfigurationError::DuplicateColumn(_))));
    }

    #[test]
    fn test_from_rows_pads_short_rows() {
        let ds = Dataset::from_rows(
            vec!["a".into(), "b".into()],
            vec![vec![Cell::Number(1.0)], vec![Cell::Number(2.0), "x".into()]],
        )
        .unwrap();

        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.column("b").unwrap().cells[0], Cell::Missing);
        assert_eq!(ds.column("b").unwrap().cells[1], Cell::Text("x".into()));
    }

    #[test]
    fn test_with_column_keeps_original() {
        let ds = Dataset::new(vec![Column::new("age", nums(&[21.0, 30.0]))]).unwrap();
        let extended = ds
            .with_column(Column::new("group", vec!["a".into(), "b".into()]))
            .unwrap();

        assert_eq!(ds.columns().len(), 1);
        assert_eq!(extended.column_names(), vec!["age", "group"]);
        assert!(ds.require_column("group").is_err());
    }

    #[test]
    fn test_with_column_length_mismatch() {
        let ds = Dataset::new(vec![Column::new("age", nums(&[21.0, 30.0]))]).unwrap();
        match ds.with_column(Column::new("mass", nums(&[28.1, 33.6, 43.1]))) {
            Err(ConfigurationError::LengthMismatch { column, expected, found }) => {
                assert_eq!(column, "mass");
                assert_eq!(expected, 2);
                assert_eq!(found, 3);
            }
            other => panic!("expected length mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_column_type_inference() {
        assert_eq!(
            Column::new("a", vec![Cell::Number(1.0), Cell::Missing]).column_type(),
            ColumnType::Numeric
        );
        assert_eq!(
            Column::new("b", vec![Cell::Number(1.0), "pos".into()]).column_type(),
            ColumnType::Text
        );
        assert_eq!(
            Column::new("c", vec![Cell::Missing]).column_type(),
            ColumnType::Empty
        );
    }

    #[test]
    fn test_distinct_levels_numeric_order() {
        let col = Column::new("pregnant", nums(&[10.0, 2.0, 1.0, 2.0]));
        assert_eq!(col.distinct_levels(), vec!["1", "2", "10"]);
    }

    #[test]
    fn test_distinct_levels_declared_order_wins() {
        let col = Column::new("parity", vec!["multi".into(), "nulli".into()])
            .with_levels(vec!["nulli".into(), "multi".into(), "grand".into()]);
        assert_eq!(col.distinct_levels(), vec!["nulli", "multi", "grand"]);
    }

    #[test]
    fn test_level_key_integral_numbers() {
        assert_eq!(Cell::Number(1.0).level_key().as_deref(), Some("1"));
        assert_eq!(Cell::Number(2.5).level_key().as_deref(), Some("2.5"));
        assert_eq!(Cell::Missing.level_key(), None);
    }
}

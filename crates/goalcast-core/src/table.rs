// In-memory match table: named columns over rows of typed cells.
//
// Every operation consumes the table and returns a new one, so each pipeline
// stage hands its output to the next without shared mutable state.

use chrono::NaiveDate;
use std::collections::HashSet;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// A single typed value in a [`MatchTable`]. There is no null variant: a
/// value that cannot be computed removes its whole row instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Date(NaiveDate),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    /// Short type name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Cell::Date(_) => "date",
            Cell::Int(_) => "integer",
            Cell::Float(_) => "float",
            Cell::Text(_) => "text",
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Cell::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of the cell. Integers widen to `f64`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    #[error("column `{0}` not found")]
    MissingColumn(String),

    #[error("column `{0}` appears more than once")]
    DuplicateColumn(String),

    #[error("row has {actual} cells but the table has {expected} columns")]
    RowWidth { expected: usize, actual: usize },

    #[error("column `{column}` has {actual} values but the table has {expected} rows")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("column `{column}` row {row}: expected {expected}, found {found}")]
    CellType {
        column: String,
        row: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("column `{column}` row {row}: {message}")]
    InvalidValue {
        column: String,
        row: usize,
        message: String,
    },

    #[error("moving average window must be greater than 0")]
    ZeroWindow,
}

// ---------------------------------------------------------------------------
// MatchTable
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl MatchTable {
    /// Create an empty table with the given column names. Names must be unique.
    pub fn new(columns: Vec<String>) -> Result<Self, TableError> {
        ensure_unique(&columns)?;
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    /// Append a row. The row must have exactly one cell per column.
    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::RowWidth {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Result<usize, TableError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    /// Iterate over the cells of one column, top to bottom.
    pub fn column(&self, name: &str) -> Result<impl Iterator<Item = &Cell> + '_, TableError> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Collect a column as dates, failing on the first non-date cell.
    pub fn date_column(&self, name: &str) -> Result<Vec<NaiveDate>, TableError> {
        self.typed_column(name, "date", Cell::as_date)
    }

    /// Collect a column as `f64`, accepting integer and float cells.
    pub fn number_column(&self, name: &str) -> Result<Vec<f64>, TableError> {
        self.typed_column(name, "number", Cell::as_number)
    }

    /// Collect a column as non-negative integers that fit in `u32`.
    pub fn count_column(&self, name: &str) -> Result<Vec<u32>, TableError> {
        let ints = self.typed_column(name, "integer", Cell::as_int)?;
        ints.into_iter()
            .enumerate()
            .map(|(row, v)| {
                u32::try_from(v).map_err(|_| TableError::InvalidValue {
                    column: name.to_string(),
                    row,
                    message: format!("expected a non-negative count, got {v}"),
                })
            })
            .collect()
    }

    fn typed_column<T>(
        &self,
        name: &str,
        expected: &'static str,
        get: impl Fn(&Cell) -> Option<T>,
    ) -> Result<Vec<T>, TableError> {
        self.column(name)?
            .enumerate()
            .map(|(row, cell)| {
                get(cell).ok_or_else(|| TableError::CellType {
                    column: name.to_string(),
                    row,
                    expected,
                    found: cell.kind(),
                })
            })
            .collect()
    }

    /// Set a column's values, replacing an existing column of the same name
    /// in place or appending a new one at the end.
    pub fn with_column(mut self, name: &str, values: Vec<Cell>) -> Result<Self, TableError> {
        if values.len() != self.rows.len() {
            return Err(TableError::LengthMismatch {
                column: name.to_string(),
                expected: self.rows.len(),
                actual: values.len(),
            });
        }

        match self.columns.iter().position(|c| c == name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(self)
    }

    /// Keep only the named columns, in the given order.
    pub fn select(self, names: &[String]) -> Result<Self, TableError> {
        ensure_unique(names)?;
        let indices = names
            .iter()
            .map(|n| self.column_index(n))
            .collect::<Result<Vec<_>, _>>()?;

        let rows = self
            .rows
            .into_iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();

        Ok(Self {
            columns: names.to_vec(),
            rows,
        })
    }

    /// Remove the named columns. Every name must exist.
    pub fn drop_columns(self, names: &[String]) -> Result<Self, TableError> {
        let mut dropped = HashSet::new();
        for name in names {
            self.column_index(name)?;
            dropped.insert(name.as_str());
        }

        let keep: Vec<String> = self
            .columns
            .iter()
            .filter(|c| !dropped.contains(c.as_str()))
            .cloned()
            .collect();
        self.select(&keep)
    }

    /// Keep the rows whose entry in `mask` is `true`.
    pub fn retain_rows(self, mask: &[bool]) -> Result<Self, TableError> {
        if mask.len() != self.rows.len() {
            return Err(TableError::LengthMismatch {
                column: "<row mask>".to_string(),
                expected: self.rows.len(),
                actual: mask.len(),
            });
        }

        let rows = self
            .rows
            .into_iter()
            .zip(mask)
            .filter_map(|(row, &keep)| keep.then_some(row))
            .collect();

        Ok(Self {
            columns: self.columns,
            rows,
        })
    }
}

fn ensure_unique(names: &[String]) -> Result<(), TableError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(TableError::DuplicateColumn(name.clone()));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

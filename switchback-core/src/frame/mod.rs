//! Time-indexed columnar frames.
//!
//! A [`Frame`] is a named collection of equal-length columns sharing one
//! designated date column (named [`DATE_IDX`]). Columns are typed arrays:
//! `f64` values or calendar dates. Row `i` across all columns refers to the
//! same instant, and dates are strictly increasing.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod ops;

pub use ops::{merge_and_time_align, rolling};

/// Name of the designated date column in every frame.
pub const DATE_IDX: &str = "DATE";

/// Structured error types for frame operations.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("column '{0}' has the wrong type for this operation")]
    TypeMismatch(String),

    #[error("row has {got} cells but the frame has {want} columns")]
    RowArity { want: usize, got: usize },

    #[error("columns have unequal lengths")]
    LengthMismatch,

    #[error("operation requires a non-empty frame")]
    Empty,
}

/// A single typed cell, used when appending or splicing rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell {
    Float(f64),
    Date(NaiveDate),
}

/// Typed column payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Values {
    Float(Vec<f64>),
    Date(Vec<NaiveDate>),
}

impl Values {
    fn len(&self) -> usize {
        match self {
            Values::Float(v) => v.len(),
            Values::Date(v) => v.len(),
        }
    }
}

/// A named, typed column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    name: String,
    values: Values,
}

impl Column {
    pub fn float(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self { name: name.into(), values: Values::Float(values) }
    }

    pub fn date(name: impl Into<String>, values: Vec<NaiveDate>) -> Self {
        Self { name: name.into(), values: Values::Date(values) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the float payload, or `None` for a date column.
    pub fn as_float(&self) -> Option<&[f64]> {
        match &self.values {
            Values::Float(v) => Some(v),
            Values::Date(_) => None,
        }
    }

    /// Borrow the date payload, or `None` for a float column.
    pub fn as_date(&self) -> Option<&[NaiveDate]> {
        match &self.values {
            Values::Date(v) => Some(v),
            Values::Float(_) => None,
        }
    }

    fn push(&mut self, cell: Cell) -> Result<(), FrameError> {
        match (&mut self.values, cell) {
            (Values::Float(v), Cell::Float(x)) => v.push(x),
            (Values::Date(v), Cell::Date(d)) => v.push(d),
            _ => return Err(FrameError::TypeMismatch(self.name.clone())),
        }
        Ok(())
    }

    fn insert(&mut self, pos: usize, cell: Cell) -> Result<(), FrameError> {
        match (&mut self.values, cell) {
            (Values::Float(v), Cell::Float(x)) => v.insert(pos, x),
            (Values::Date(v), Cell::Date(d)) => v.insert(pos, d),
            _ => return Err(FrameError::TypeMismatch(self.name.clone())),
        }
        Ok(())
    }

    fn take_rows(&self, keep: &[usize]) -> Column {
        let values = match &self.values {
            Values::Float(v) => Values::Float(keep.iter().map(|&i| v[i]).collect()),
            Values::Date(v) => Values::Date(keep.iter().map(|&i| v[i]).collect()),
        };
        Column { name: self.name.clone(), values }
    }
}

/// A named collection of equal-length columns with one date axis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Frame {
    columns: Vec<Column>,
}

impl Frame {
    /// Build a frame, verifying that all columns have the same length.
    pub fn new(columns: Vec<Column>) -> Result<Self, FrameError> {
        if let Some(first) = columns.first() {
            let n = first.len();
            if columns.iter().any(|c| c.len() != n) {
                return Err(FrameError::LengthMismatch);
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn nrows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    /// Index of the column with the given name.
    pub fn name_to_column(&self, name: &str) -> Result<usize, FrameError> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| FrameError::ColumnNotFound(name.to_string()))
    }

    pub fn column(&self, name: &str) -> Result<&Column, FrameError> {
        let idx = self.name_to_column(name)?;
        Ok(&self.columns[idx])
    }

    /// The date axis (the column named [`DATE_IDX`]).
    pub fn dates(&self) -> Result<&[NaiveDate], FrameError> {
        self.column(DATE_IDX)?
            .as_date()
            .ok_or_else(|| FrameError::TypeMismatch(DATE_IDX.to_string()))
    }

    /// Float payload of a named column.
    pub fn floats(&self, name: &str) -> Result<&[f64], FrameError> {
        self.column(name)?
            .as_float()
            .ok_or_else(|| FrameError::TypeMismatch(name.to_string()))
    }

    pub fn rename_column(&mut self, name: &str, new_name: &str) -> Result<(), FrameError> {
        let idx = self.name_to_column(name)?;
        self.columns[idx].rename(new_name);
        Ok(())
    }

    /// Append one row; cells must match the column order and types.
    pub fn push_row(&mut self, row: &[Cell]) -> Result<(), FrameError> {
        if row.len() != self.columns.len() {
            return Err(FrameError::RowArity { want: self.columns.len(), got: row.len() });
        }
        for (col, cell) in self.columns.iter_mut().zip(row) {
            col.push(*cell)?;
        }
        Ok(())
    }

    /// Splice one row in at `pos`, preserving row alignment across columns.
    pub fn insert_row(&mut self, pos: usize, row: &[Cell]) -> Result<(), FrameError> {
        if row.len() != self.columns.len() {
            return Err(FrameError::RowArity { want: self.columns.len(), got: row.len() });
        }
        for (col, cell) in self.columns.iter_mut().zip(row) {
            col.insert(pos, *cell)?;
        }
        Ok(())
    }

    fn take_rows(&self, keep: &[usize]) -> Frame {
        Frame { columns: self.columns.iter().map(|c| c.take_rows(keep)).collect() }
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CellError;
use crate::table::parse_number;

/// A single `(row, column, value)` data point of the summary table.
///
/// Row and column are opaque labels. Lookups by coordinate ignore `value`, but
/// selection membership compares the full triple.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(try_from = "RawCell", into = "(String, String, f64)")]
pub struct Cell {
    pub row: String,
    pub column: String,
    pub value: f64,
}

impl Cell {
    pub fn create(row: impl Into<String>, column: impl Into<String>, value: f64) -> Self {
        Cell {
            row: row.into(),
            column: column.into(),
            value,
        }
    }

    /// Builds a cell from untrusted interaction input (data attributes of a
    /// clicked table cell, JSON bodies). Labels are trimmed; the value must
    /// parse as a finite number, thousands separators allowed.
    pub fn from_raw(row: &str, column: &str, value: &str) -> Result<Self, CellError> {
        let row = row.trim();
        let column = column.trim();
        if row.is_empty() {
            return Err(CellError::MissingRow);
        }
        if column.is_empty() {
            return Err(CellError::MissingColumn);
        }

        let value = parse_number(value).ok_or_else(|| CellError::NonNumericValue(value.to_string()))?;

        Ok(Cell::create(row, column, value))
    }

    pub fn same_coord(&self, row: &str, column: &str) -> bool {
        self.row == row && self.column == column
    }

    pub fn coord(&self) -> (&str, &str) {
        (&self.row, &self.column)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.row, self.column, self.value)
    }
}

impl From<Cell> for (String, String, f64) {
    fn from(cell: Cell) -> Self {
        (cell.row, cell.column, cell.value)
    }
}

/// Row/column labels arrive as strings, but numeric-looking labels
/// (years, account numbers) are sometimes sent as JSON numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawLabel {
    Text(String),
    Number(serde_json::Number),
}

impl RawLabel {
    fn into_label(self) -> String {
        match self {
            RawLabel::Text(s) => s,
            RawLabel::Number(n) => n.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Number(f64),
    Text(String),
}

#[derive(Deserialize)]
struct RawCell(RawLabel, RawLabel, RawValue);

impl TryFrom<RawCell> for Cell {
    type Error = CellError;

    fn try_from(raw: RawCell) -> Result<Self, Self::Error> {
        let RawCell(row, column, value) = raw;
        let value = match value {
            RawValue::Number(n) => n.to_string(),
            RawValue::Text(s) => s,
        };
        Cell::from_raw(&row.into_label(), &column.into_label(), &value)
    }
}

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

lazy_static! {
    // Plain decimals and thousands-grouped amounts such as "1,250.75".
    static ref NUMBER_REGEX: Regex =
        Regex::new(r"^[+-]?(\d{1,3}(,\d{3})+|\d+)(\.\d+)?$").unwrap();
}

/// Summary table as delivered by the data provider.
///
/// `columns[0]` names the row-label column; every other column is a data column.
/// Each record maps column name to value.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct SummaryTable {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub data: Vec<Map<String, Value>>,
}

impl SummaryTable {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() || self.columns.len() < 2
    }

    pub fn label_column(&self) -> Option<&str> {
        self.columns.first().map(String::as_str)
    }

    pub fn data_columns(&self) -> &[String] {
        self.columns.get(1..).unwrap_or(&[])
    }

    pub fn has_data_column(&self, column: &str) -> bool {
        self.data_columns().iter().any(|c| c == column)
    }

    pub fn row_labels(&self) -> Vec<String> {
        let Some(label_column) = self.label_column() else {
            return Vec::new();
        };
        self.data
            .iter()
            .filter_map(|record| record.get(label_column).and_then(value_label))
            .collect()
    }

    fn record(&self, row: &str) -> Option<&Map<String, Value>> {
        let label_column = self.label_column()?;
        self.data.iter().find(|record| {
            record
                .get(label_column)
                .and_then(value_label)
                .is_some_and(|label| label == row)
        })
    }

    /// Whether `(row, column)` names a data cell of this table.
    pub fn contains(&self, row: &str, column: &str) -> bool {
        self.has_data_column(column) && self.record(row).is_some()
    }

    /// Numeric value at `(row, column)`; `None` when absent, null or non-numeric.
    pub fn value_at(&self, row: &str, column: &str) -> Option<f64> {
        if !self.has_data_column(column) {
            return None;
        }
        self.record(row)?.get(column).and_then(numeric_value)
    }
}

/// Label text of a JSON scalar (strings as-is, numbers and booleans printed).
pub fn value_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Parses numeric text the way table values are read: plain decimals and
/// thousands-grouped amounts. Non-finite results are rejected.
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    let parsed = if NUMBER_REGEX.is_match(text) {
        text.replace(',', "").parse::<f64>().ok()
    } else {
        text.parse::<f64>().ok()
    };
    parsed.filter(|v| v.is_finite())
}

use serde::Serialize;
use std::collections::BTreeMap;

use crate::cell::Cell;

/// Suffix appended to the span id of a bare (`"row, column"`) reference.
pub const SIMPLE_SUFFIX: &str = "-simple";

/// Mapping from span id to the cell that span denotes, for one annotation pass.
///
/// Built wholesale by the matcher and discarded with the pass; never updated
/// incrementally.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CrossRefIndex {
    entries: BTreeMap<String, Cell>,
}

impl CrossRefIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, span_id: String, cell: Cell) {
        self.entries.entry(span_id).or_insert(cell);
    }

    /// Direct lookup, falling back to the labeled id when a bare id is unknown.
    pub fn resolve(&self, span_id: &str) -> Option<&Cell> {
        self.entries.get(span_id).or_else(|| {
            span_id
                .strip_suffix(SIMPLE_SUFFIX)
                .and_then(|base| self.entries.get(base))
        })
    }

    /// Every span id (labeled and bare) whose cell sits at `(row, column)`.
    pub fn spans_at(&self, row: &str, column: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, cell)| cell.same_coord(row, column))
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn contains_span(&self, span_id: &str) -> bool {
        self.entries.contains_key(span_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.entries.iter().map(|(id, cell)| (id.as_str(), cell))
    }

    /// Span ids whose cell is not a member of `selection`. Empty for any index
    /// built against that same selection.
    pub fn dangling<'a>(&'a self, selection: &[Cell]) -> Vec<&'a str> {
        self.entries
            .iter()
            .filter(|(_, cell)| !selection.contains(cell))
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

use serde::Serialize;

use crate::cell::Cell;
use crate::error::SessionError;

/// Result of a toggle, for the caller to reflect in the visual layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Membership {
    Selected,
    Unselected,
}

/// Ordered, duplicate-free collection of selected cells plus the snapshot taken
/// when the file was loaded.
///
/// Insertion order is the only order. Membership compares the full
/// `(row, column, value)` triple, so the same coordinate with another value is a
/// different element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionSet {
    cells: Vec<Cell>,
    original: Vec<Cell>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current selection wholesale and snapshots it. Called once per
    /// file load with the provider's initial selection.
    pub fn load(&mut self, cells: Vec<Cell>) {
        self.replace(cells);
        self.snapshot();
    }

    /// Replaces the current selection, dropping repeated triples.
    pub fn replace(&mut self, cells: Vec<Cell>) {
        self.cells.clear();
        for cell in cells {
            if self.contains(&cell) {
                log::debug!("Dropping duplicate selected cell {}", cell);
                continue;
            }
            self.cells.push(cell);
        }
    }

    pub fn snapshot(&mut self) {
        self.original = self.cells.clone();
    }

    pub fn toggle(&mut self, cell: Cell) -> Membership {
        match self.cells.iter().position(|c| *c == cell) {
            Some(index) => {
                self.cells.remove(index);
                Membership::Unselected
            }
            None => {
                self.cells.push(cell);
                Membership::Selected
            }
        }
    }

    /// Empties the selection; the snapshot is kept.
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn reset_to_original(&mut self) -> Result<(), SessionError> {
        if self.original.is_empty() {
            return Err(SessionError::NothingToReset);
        }
        self.cells = self.original.clone();
        Ok(())
    }

    /// Drops both the selection and the snapshot, used when another file is selected.
    pub fn teardown(&mut self) {
        self.cells.clear();
        self.original.clear();
    }

    pub fn contains(&self, cell: &Cell) -> bool {
        self.cells.iter().any(|c| c == cell)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn original(&self) -> &[Cell] {
        &self.original
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

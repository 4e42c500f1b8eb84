use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::cell::Cell;
use crate::xref::CrossRefIndex;

/// Something the presentation layer can highlight.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum HighlightTarget {
    TableCell { row: String, column: String },
    Span { span_id: String },
}

impl HighlightTarget {
    pub fn table_cell(row: impl Into<String>, column: impl Into<String>) -> Self {
        HighlightTarget::TableCell {
            row: row.into(),
            column: column.into(),
        }
    }

    pub fn span(span_id: impl Into<String>) -> Self {
        HighlightTarget::Span {
            span_id: span_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightKind {
    /// Transient, follows the pointer.
    Hover,
    /// Mirrors the Selection Set.
    Selected,
}

/// The narrow interface between the highlight logic and whatever renders it.
pub trait HighlightSurface {
    fn apply_highlight(&mut self, kind: HighlightKind, target: HighlightTarget);
    fn clear_highlights(&mut self, kind: HighlightKind);
}

/// In-memory surface: records which targets are currently lit. The web layer ships
/// it to the browser as part of the view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HighlightSet {
    hover: BTreeSet<HighlightTarget>,
    selected: BTreeSet<HighlightTarget>,
}

impl HighlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hovered(&self) -> &BTreeSet<HighlightTarget> {
        &self.hover
    }

    pub fn selected(&self) -> &BTreeSet<HighlightTarget> {
        &self.selected
    }

    pub fn is_lit(&self, kind: HighlightKind, target: &HighlightTarget) -> bool {
        match kind {
            HighlightKind::Hover => self.hover.contains(target),
            HighlightKind::Selected => self.selected.contains(target),
        }
    }
}

impl HighlightSurface for HighlightSet {
    fn apply_highlight(&mut self, kind: HighlightKind, target: HighlightTarget) {
        match kind {
            HighlightKind::Hover => self.hover.insert(target),
            HighlightKind::Selected => self.selected.insert(target),
        };
    }

    fn clear_highlights(&mut self, kind: HighlightKind) {
        match kind {
            HighlightKind::Hover => self.hover.clear(),
            HighlightKind::Selected => self.selected.clear(),
        }
    }
}

/// Identifies one annotation pass. Hover events carry the pass they were bound
/// against; events from an older pass are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderPass(pub u64);

impl fmt::Display for RenderPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Links hovered spans to table cells and back through the current index.
#[derive(Debug, Clone, Default)]
pub struct HighlightSynchronizer {
    pass: RenderPass,
    index: CrossRefIndex,
}

impl HighlightSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pass(&self) -> RenderPass {
        self.pass
    }

    pub fn index(&self) -> &CrossRefIndex {
        &self.index
    }

    /// Tears down the bindings of the previous pass and binds against `index`.
    /// Hover highlights of the old pass are cleared with it.
    pub fn rebind<S: HighlightSurface>(&mut self, index: CrossRefIndex, surface: &mut S) -> RenderPass {
        surface.clear_highlights(HighlightKind::Hover);
        self.index = index;
        self.pass = RenderPass(self.pass.0 + 1);
        self.pass
    }

    fn is_current(&self, pass: RenderPass) -> bool {
        if pass != self.pass {
            log::debug!("Ignoring hover bound to pass {} (current {})", pass, self.pass);
            return false;
        }
        true
    }

    /// Pointer entered a reference span: light the span and every table cell at its
    /// cell's coordinate. Returns `false` for events from a stale pass.
    pub fn hover_span<S: HighlightSurface>(&self, pass: RenderPass, span_id: &str, surface: &mut S) -> bool {
        if !self.is_current(pass) {
            return false;
        }

        match self.index.resolve(span_id) {
            Some(cell) => surface.apply_highlight(
                HighlightKind::Hover,
                HighlightTarget::table_cell(cell.row.clone(), cell.column.clone()),
            ),
            None => log::debug!("Span {} is not in the cross-reference index", span_id),
        }
        surface.apply_highlight(HighlightKind::Hover, HighlightTarget::span(span_id));
        true
    }

    /// Pointer entered a table cell: light the cell and every span that refers to
    /// its coordinate, labeled and bare alike.
    pub fn hover_cell<S: HighlightSurface>(
        &self,
        pass: RenderPass,
        row: &str,
        column: &str,
        surface: &mut S,
    ) -> bool {
        if !self.is_current(pass) {
            return false;
        }
        if row.is_empty() || column.is_empty() {
            return false;
        }

        surface.apply_highlight(HighlightKind::Hover, HighlightTarget::table_cell(row, column));
        for span_id in self.index.spans_at(row, column) {
            surface.apply_highlight(HighlightKind::Hover, HighlightTarget::span(span_id));
        }
        true
    }

    /// Pointer left a span or a cell. Clears every hover highlight, not only the
    /// ones the matching enter introduced.
    pub fn hover_exit<S: HighlightSurface>(&self, pass: RenderPass, surface: &mut S) -> bool {
        if !self.is_current(pass) {
            return false;
        }
        surface.clear_highlights(HighlightKind::Hover);
        true
    }

    /// Re-renders the "selected" state from scratch.
    pub fn render_selection<S: HighlightSurface>(&self, selection: &[Cell], surface: &mut S) {
        surface.clear_highlights(HighlightKind::Selected);
        for cell in selection {
            surface.apply_highlight(
                HighlightKind::Selected,
                HighlightTarget::table_cell(cell.row.clone(), cell.column.clone()),
            );
        }
    }
}

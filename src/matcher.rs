//! Coordinate reference matching.
//!
//! For every selected cell, in selection order, two textual forms are searched for in
//! the commentary, case-insensitively:
//!
//! - the *labeled* form `Cell <row>, <column>`, wrapped with span id `cell-ref-<i>`
//! - the *bare* form `<row>, <column>` as a whole word, wrapped with `cell-ref-<i>-simple`
//!
//! Every occurrence of a cell's pattern receives the same span id. Matches never
//! overlap: text claimed by an earlier span is left alone by later patterns.

use regex::Regex;
use serde::Serialize;

use crate::cell::Cell;
use crate::xref::{CrossRefIndex, SIMPLE_SUFFIX};

pub const SPAN_PREFIX: &str = "cell-ref-";

/// Rendered in place of an empty or whitespace-only commentary.
pub const NO_COMMENTARY_PLACEHOLDER: &str =
    r#"<em class="text-muted">No commentary available.</em>"#;

pub fn labeled_span_id(index: usize) -> String {
    format!("{SPAN_PREFIX}{index}")
}

pub fn bare_span_id(index: usize) -> String {
    format!("{SPAN_PREFIX}{index}{SIMPLE_SUFFIX}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceForm {
    Labeled,
    Bare,
}

/// A run of the annotated commentary: either untouched text or a reference span.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Text {
        text: String,
    },
    Reference {
        span_id: String,
        form: ReferenceForm,
        row: String,
        column: String,
        text: String,
    },
}

impl Segment {
    pub fn text(&self) -> &str {
        match self {
            Segment::Text { text } | Segment::Reference { text, .. } => text,
        }
    }
}

/// The annotated commentary together with its Cross-Reference Index.
///
/// Both are produced by one matcher call and replace the previous pass as a unit.
/// The canonical commentary string is never modified; `plain_text` on a
/// non-placeholder annotation gives it back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    segments: Vec<Segment>,
    index: CrossRefIndex,
    placeholder: bool,
}

impl Default for Annotation {
    fn default() -> Self {
        Self::placeholder()
    }
}

impl Annotation {
    pub fn placeholder() -> Self {
        Annotation {
            segments: Vec::new(),
            index: CrossRefIndex::new(),
            placeholder: true,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn index(&self) -> &CrossRefIndex {
        &self.index
    }

    /// Reference segments in document order.
    pub fn references(&self) -> impl Iterator<Item = &Segment> {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Reference { .. }))
    }

    pub fn plain_text(&self) -> String {
        self.segments.iter().map(Segment::text).collect()
    }

    /// Renders the commentary as HTML, escaping text and wrapping every reference in
    /// a `cell-reference` span that carries its coordinate.
    pub fn to_html(&self) -> String {
        if self.placeholder {
            return NO_COMMENTARY_PLACEHOLDER.to_string();
        }

        let mut html = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text { text } => html.push_str(&escape_html(text)),
                Segment::Reference {
                    span_id,
                    row,
                    column,
                    text,
                    ..
                } => {
                    html.push_str(&format!(
                        r#"<span id="{}" class="cell-reference" data-row="{}" data-col="{}">{}</span>"#,
                        escape_html(span_id),
                        escape_html(row),
                        escape_html(column),
                        escape_html(text)
                    ));
                }
            }
        }
        html
    }
}

/// Turns commentary text plus the current selection into an [`Annotation`].
///
/// The shared-id behaviour of [`CoordinateMatcher`] lives behind this trait so a
/// per-occurrence id scheme can replace it without touching the session.
pub trait ReferenceMatcher {
    fn annotate(&self, document: &str, selection: &[Cell]) -> Annotation;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinateMatcher;

struct Claim {
    start: usize,
    end: usize,
    span_id: String,
    form: ReferenceForm,
    cell: usize,
}

impl ReferenceMatcher for CoordinateMatcher {
    /// Annotates `document` against `selection`.
    ///
    /// # Arguments
    /// * `document` - The canonical commentary text
    /// * `selection` - Current Selection Set, in selection order
    ///
    /// # Returns
    /// * `Annotation` - The placeholder for blank text, otherwise the segmented text
    ///   and an index holding only ids that received at least one occurrence
    ///
    /// # Examples
    /// ```
    /// use cellref::{Cell, CoordinateMatcher, ReferenceMatcher};
    ///
    /// let selection = vec![Cell::create("2024-01", "Revenue", 500.0)];
    /// let annotation = CoordinateMatcher.annotate("See Cell 2024-01, Revenue for details", &selection);
    /// assert_eq!(annotation.index().len(), 1);
    /// assert!(annotation.index().contains_span("cell-ref-0"));
    /// ```
    fn annotate(&self, document: &str, selection: &[Cell]) -> Annotation {
        if document.trim().is_empty() {
            return Annotation::placeholder();
        }

        let mut claims: Vec<Claim> = Vec::new();

        for (i, cell) in selection.iter().enumerate() {
            let row = regex::escape(&cell.row);
            let column = regex::escape(&cell.column);

            let forms = [
                (
                    format!(r"(?i)Cell\s+{row}\s*,\s*{column}"),
                    ReferenceForm::Labeled,
                    labeled_span_id(i),
                ),
                (
                    format!(r"(?i){row}\s*,\s*{column}"),
                    ReferenceForm::Bare,
                    bare_span_id(i),
                ),
            ];

            for (pattern, form, span_id) in forms {
                let pattern = match Regex::new(&pattern) {
                    Ok(re) => re,
                    Err(e) => {
                        log::warn!("Skipping reference pattern for cell {}: {}", cell, e);
                        continue;
                    }
                };

                let whole_word = form == ReferenceForm::Bare;
                for (start, end) in find_occurrences(&pattern, document, whole_word) {
                    if claims.iter().any(|c| start < c.end && c.start < end) {
                        continue;
                    }
                    claims.push(Claim {
                        start,
                        end,
                        span_id: span_id.clone(),
                        form,
                        cell: i,
                    });
                }
            }
        }

        claims.sort_by_key(|c| c.start);

        let mut segments = Vec::new();
        let mut index = CrossRefIndex::new();
        let mut cursor = 0;

        for claim in claims {
            if claim.start > cursor {
                segments.push(Segment::Text {
                    text: document[cursor..claim.start].to_string(),
                });
            }
            let cell = &selection[claim.cell];
            index.insert(claim.span_id.clone(), cell.clone());
            segments.push(Segment::Reference {
                span_id: claim.span_id,
                form: claim.form,
                row: cell.row.clone(),
                column: cell.column.clone(),
                text: document[claim.start..claim.end].to_string(),
            });
            cursor = claim.end;
        }

        if cursor < document.len() {
            segments.push(Segment::Text {
                text: document[cursor..].to_string(),
            });
        }

        log::debug!(
            "Annotated commentary: {} selected cells, {} span ids",
            selection.len(),
            index.len()
        );

        Annotation {
            segments,
            index,
            placeholder: false,
        }
    }
}

/// All non-overlapping matches of `pattern`, left to right. With `whole_word`, a
/// match touching a word character on either side is rejected and the search
/// resumes one character further, so a later valid match is not shadowed.
fn find_occurrences(pattern: &Regex, document: &str, whole_word: bool) -> Vec<(usize, usize)> {
    let mut found = Vec::new();
    let mut pos = 0;

    while pos <= document.len() {
        let Some(m) = pattern.find_at(document, pos) else {
            break;
        };

        if m.start() == m.end() {
            break;
        }

        if !whole_word || is_word_bounded(document, m.start(), m.end()) {
            found.push((m.start(), m.end()));
            pos = m.end();
        } else {
            let step = document[m.start()..]
                .chars()
                .next()
                .map_or(1, char::len_utf8);
            pos = m.start() + step;
        }
    }

    found
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_word_bounded(document: &str, start: usize, end: usize) -> bool {
    let before = document[..start].chars().next_back();
    let after = document[end..].chars().next();
    !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

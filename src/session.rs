//! Session State Controller.
//!
//! One owned [`Session`] holds everything the page shows: lifecycle state, selection,
//! settings, table, commentary, the current annotation and highlight bindings. Every
//! mutation goes through a method here, and every method that changes the selection
//! or the commentary re-runs matching, index rebuild and highlight rebinding before
//! it returns.
//!
//! Round-trips to the backend are split in two halves: `begin_*` validates, marks the
//! request kind pending and hands back a [`Ticket`] plus the request payload;
//! `complete_*` takes the ticket and the collaborator's result. Tickets carry the
//! session generation, which advances on every file selection, so answers to requests
//! issued for a previous file are discarded instead of overwriting the new one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::cell::Cell;
use crate::error::{ServiceError, SessionError};
use crate::highlight::{HighlightSet, HighlightSurface, HighlightSynchronizer, RenderPass};
use crate::matcher::{Annotation, CoordinateMatcher, ReferenceMatcher};
use crate::protocol::{
    now_millis, CommentaryModifyRequest, CommentaryRefreshRequest, CommentaryResponse,
    FileDetails, FileDetailsRequest, FileDetailsResponse, SettingsSaveRequest,
    SettingsSaveResponse,
};
use crate::selection::{Membership, SelectionSet};
use crate::table::SummaryTable;

pub const DEFAULT_TOP_N: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    FileLoad,
    CommentaryRefresh,
    CommentaryModify,
    SettingsSave,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RequestKind::FileLoad => "file load",
            RequestKind::CommentaryRefresh => "commentary refresh",
            RequestKind::CommentaryModify => "commentary modification",
            RequestKind::SettingsSave => "settings save",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LifecycleState {
    Idle,
    Loading { filename: String },
    Ready { filename: String },
}

impl LifecycleState {
    pub fn filename(&self) -> Option<&str> {
        match self {
            LifecycleState::Idle => None,
            LifecycleState::Loading { filename } | LifecycleState::Ready { filename } => {
                Some(filename)
            }
        }
    }
}

/// Monotonic session generation; advances on every file selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Generation(pub u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle for one outstanding request, returned by `begin_*` and consumed by the
/// matching `complete_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub kind: RequestKind,
    pub generation: Generation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Danger,
}

/// Transient user notification. The presentation layer drains and auto-dismisses them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

pub struct Session<S = HighlightSet, M = CoordinateMatcher> {
    state: LifecycleState,
    generation: Generation,
    selection: SelectionSet,
    contributing_columns: Vec<String>,
    top_n: u32,
    details: Option<FileDetails>,
    table: SummaryTable,
    commentary: String,
    annotation: Annotation,
    sync: HighlightSynchronizer,
    surface: S,
    matcher: M,
    pending: BTreeSet<RequestKind>,
    notices: Vec<Notice>,
}

impl Default for Session {
    fn default() -> Self {
        Session::new(HighlightSet::new(), CoordinateMatcher)
    }
}

impl<S: HighlightSurface, M: ReferenceMatcher> Session<S, M> {
    pub fn new(surface: S, matcher: M) -> Self {
        let mut session = Session {
            state: LifecycleState::Idle,
            generation: Generation::default(),
            selection: SelectionSet::new(),
            contributing_columns: Vec::new(),
            top_n: DEFAULT_TOP_N,
            details: None,
            table: SummaryTable::default(),
            commentary: String::new(),
            annotation: Annotation::placeholder(),
            sync: HighlightSynchronizer::new(),
            surface,
            matcher,
            pending: BTreeSet::new(),
            notices: Vec::new(),
        };
        session.refresh_view();
        session
    }

    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn contributing_columns(&self) -> &[String] {
        &self.contributing_columns
    }

    pub fn top_n(&self) -> u32 {
        self.top_n
    }

    pub fn details(&self) -> Option<&FileDetails> {
        self.details.as_ref()
    }

    pub fn table(&self) -> &SummaryTable {
        &self.table
    }

    pub fn commentary(&self) -> &str {
        &self.commentary
    }

    pub fn annotation(&self) -> &Annotation {
        &self.annotation
    }

    pub fn commentary_html(&self) -> String {
        self.annotation.to_html()
    }

    pub fn render_pass(&self) -> RenderPass {
        self.sync.pass()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn is_pending(&self, kind: RequestKind) -> bool {
        self.pending.contains(&kind)
    }

    pub fn pending(&self) -> impl Iterator<Item = RequestKind> + '_ {
        self.pending.iter().copied()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice {
            level,
            message: message.into(),
        });
    }

    /// Re-annotates the commentary against the current selection, swaps in the new
    /// index and re-renders the selected state. Runs after every mutation of either.
    fn refresh_view(&mut self) {
        let annotation = self.matcher.annotate(&self.commentary, self.selection.cells());
        debug_assert!(annotation.index().dangling(self.selection.cells()).is_empty());

        self.sync.rebind(annotation.index().clone(), &mut self.surface);
        self.annotation = annotation;

        for cell in self.selection.cells() {
            if !self.table.contains(&cell.row, &cell.column) {
                log::warn!("Selected cell {} is not in the summary table", cell);
            }
        }
        self.sync.render_selection(self.selection.cells(), &mut self.surface);
    }

    fn require_ready(&self) -> Result<(), SessionError> {
        match self.state {
            LifecycleState::Ready { .. } => Ok(()),
            _ => Err(SessionError::NotReady),
        }
    }

    fn begin(&mut self, kind: RequestKind) -> Result<Ticket, SessionError> {
        self.require_ready()?;
        if !self.pending.insert(kind) {
            return Err(SessionError::Busy(kind));
        }
        Ok(Ticket {
            kind,
            generation: self.generation,
        })
    }

    /// Accepts a ticket back. Stale tickets are rejected without touching state;
    /// current ones clear their pending flag whatever the outcome.
    fn settle(&mut self, ticket: Ticket) -> Result<(), SessionError> {
        if ticket.generation != self.generation {
            log::warn!(
                "Discarding stale {} response (generation {}, current {})",
                ticket.kind,
                ticket.generation,
                self.generation
            );
            return Err(SessionError::StaleResponse {
                kind: ticket.kind,
                got: ticket.generation,
                current: self.generation,
            });
        }
        self.pending.remove(&ticket.kind);
        Ok(())
    }

    fn fail(&mut self, prefix: &str, error: ServiceError) -> SessionError {
        log::error!("{}: {}", prefix, error);
        self.notify(NoticeLevel::Danger, format!("{}: {}", prefix, error));
        SessionError::Service(error)
    }

    /// Starts loading `filename`.
    ///
    /// Tears down everything belonging to the previous file first: selection,
    /// original snapshot, contributing columns, top-N, table and commentary. Any
    /// request still in flight for the previous file becomes stale.
    ///
    /// # Arguments
    /// * `filename` - File chosen by the user
    ///
    /// # Returns
    /// * `Result<(Ticket, FileDetailsRequest), SessionError>` - Ticket and request to send,
    ///   or `EmptyFilename`
    pub fn select_file(&mut self, filename: &str) -> Result<(Ticket, FileDetailsRequest), SessionError> {
        let filename = filename.trim();
        if filename.is_empty() {
            return Err(SessionError::EmptyFilename);
        }

        log::info!("File selected: {}", filename);
        self.teardown();
        self.generation = Generation(self.generation.0 + 1);
        self.pending.insert(RequestKind::FileLoad);
        self.state = LifecycleState::Loading {
            filename: filename.to_string(),
        };

        let ticket = Ticket {
            kind: RequestKind::FileLoad,
            generation: self.generation,
        };
        let request = FileDetailsRequest {
            filename: filename.to_string(),
            timestamp: now_millis(),
        };
        Ok((ticket, request))
    }

    fn teardown(&mut self) {
        self.selection.teardown();
        self.contributing_columns.clear();
        self.top_n = DEFAULT_TOP_N;
        self.details = None;
        self.table = SummaryTable::default();
        self.commentary.clear();
        self.pending.clear();
        self.refresh_view();
    }

    /// Applies the provider's answer for a file load.
    ///
    /// On failure the session returns to `Idle`, the (already torn down) state stays
    /// empty and a danger notice is queued. Nothing of a failed response is applied.
    pub fn complete_file_load(
        &mut self,
        ticket: Ticket,
        result: Result<FileDetailsResponse, ServiceError>,
    ) -> Result<(), SessionError> {
        self.settle(ticket)?;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.state = LifecycleState::Idle;
                return Err(self.fail("Error loading file details", e));
            }
        };

        let filename = self.state.filename().unwrap_or_default().to_string();

        self.table = response.table;
        self.details = response.details;
        self.selection.load(response.selected_cells);
        self.contributing_columns = self.known_columns(response.contributing_columns);
        self.top_n = match response.top_n {
            Some(n) if n > 0 => u32::try_from(n).unwrap_or(u32::MAX),
            _ => DEFAULT_TOP_N,
        };
        self.commentary = response.commentary;
        self.state = LifecycleState::Ready {
            filename: filename.clone(),
        };
        self.refresh_view();

        log::info!(
            "Loaded {}: {} rows, {} selected cells, {} linked spans",
            filename,
            self.table.data.len(),
            self.selection.len(),
            self.annotation.index().len()
        );
        Ok(())
    }

    fn known_columns(&self, columns: Vec<String>) -> Vec<String> {
        let mut known: Vec<String> = Vec::new();
        for column in columns {
            if !self.table.has_data_column(&column) {
                log::warn!("Ignoring unknown contributing column {:?}", column);
                continue;
            }
            if !known.contains(&column) {
                known.push(column);
            }
        }
        known
    }

    /// Toggles a cell given as raw interaction data (row label, column label, value text).
    ///
    /// Malformed input or a coordinate outside the table is logged and rejected
    /// without touching the selection.
    pub fn toggle_cell(&mut self, row: &str, column: &str, value: &str) -> Result<Membership, SessionError> {
        self.require_ready()?;

        let cell = Cell::from_raw(row, column, value).map_err(|e| {
            log::warn!("Invalid cell data: row={:?} col={:?} value={:?}: {}", row, column, value, e);
            SessionError::from(e)
        })?;

        self.toggle(cell)
    }

    pub fn toggle(&mut self, cell: Cell) -> Result<Membership, SessionError> {
        self.require_ready()?;

        if !self.table.contains(&cell.row, &cell.column) {
            log::warn!("Ignoring toggle of cell {} outside the summary table", cell);
            return Err(SessionError::UnknownCell {
                row: cell.row,
                column: cell.column,
            });
        }

        let membership = self.selection.toggle(cell);
        log::debug!("Selected cells: {:?}", self.selection.cells());
        self.refresh_view();
        Ok(membership)
    }

    pub fn clear_selection(&mut self) -> Result<(), SessionError> {
        self.require_ready()?;
        self.selection.clear();
        self.refresh_view();
        self.notify(NoticeLevel::Info, "Selection cleared.");
        Ok(())
    }

    pub fn reset_selection(&mut self) -> Result<(), SessionError> {
        self.require_ready()?;
        if let Err(e) = self.selection.reset_to_original() {
            self.notify(NoticeLevel::Warning, "No original selection to reset to.");
            return Err(e);
        }
        self.refresh_view();
        self.notify(NoticeLevel::Info, "Selection reset to original.");
        Ok(())
    }

    /// Replaces the contributing columns. Names that are not data columns of the
    /// current table are dropped.
    pub fn set_contributing_columns(&mut self, columns: Vec<String>) -> Result<(), SessionError> {
        self.require_ready()?;
        self.contributing_columns = self.known_columns(columns);
        self.refresh_view();
        Ok(())
    }

    pub fn set_top_n(&mut self, top_n: i64) -> Result<(), SessionError> {
        self.require_ready()?;
        let top_n = u32::try_from(top_n)
            .ok()
            .filter(|n| *n > 0)
            .ok_or(SessionError::InvalidTopN(top_n))?;
        self.top_n = top_n;
        self.refresh_view();
        Ok(())
    }

    /// Starts regenerating the commentary from the current selection and settings.
    pub fn begin_commentary_refresh(&mut self) -> Result<(Ticket, CommentaryRefreshRequest), SessionError> {
        let ticket = self.begin(RequestKind::CommentaryRefresh)?;
        let request = CommentaryRefreshRequest {
            selected_cells: self.selection.cells().to_vec(),
            contributing_columns: self.contributing_columns.clone(),
            top_n: self.top_n,
            timestamp: now_millis(),
        };
        Ok((ticket, request))
    }

    pub fn complete_commentary_refresh(
        &mut self,
        ticket: Ticket,
        result: Result<CommentaryResponse, ServiceError>,
    ) -> Result<(), SessionError> {
        self.settle(ticket)?;
        let response = result.map_err(|e| self.fail("Error updating commentary", e))?;
        self.replace_commentary(response.commentary);
        self.notify(NoticeLevel::Success, "Commentary updated successfully.");
        Ok(())
    }

    /// Starts rewriting the commentary from a free-form user query. A blank query is
    /// ignored.
    pub fn begin_commentary_modification(
        &mut self,
        query: &str,
    ) -> Result<(Ticket, CommentaryModifyRequest), SessionError> {
        let query = query.trim();
        if query.is_empty() {
            log::debug!("Ignoring empty commentary query");
            return Err(SessionError::EmptyQuery);
        }
        let ticket = self.begin(RequestKind::CommentaryModify)?;
        let request = CommentaryModifyRequest {
            query: query.to_string(),
            timestamp: now_millis(),
        };
        Ok((ticket, request))
    }

    pub fn complete_commentary_modification(
        &mut self,
        ticket: Ticket,
        result: Result<CommentaryResponse, ServiceError>,
    ) -> Result<(), SessionError> {
        self.settle(ticket)?;
        let response = result.map_err(|e| self.fail("Error modifying commentary", e))?;
        self.replace_commentary(response.commentary);
        self.notify(NoticeLevel::Success, "Commentary modified successfully.");
        Ok(())
    }

    fn replace_commentary(&mut self, commentary: String) {
        self.commentary = commentary;
        self.refresh_view();
    }

    pub fn begin_settings_save(&mut self) -> Result<(Ticket, SettingsSaveRequest), SessionError> {
        let ticket = self.begin(RequestKind::SettingsSave)?;
        let request = SettingsSaveRequest {
            contributing_columns: self.contributing_columns.clone(),
            top_n: self.top_n,
            timestamp: now_millis(),
        };
        Ok((ticket, request))
    }

    pub fn complete_settings_save(
        &mut self,
        ticket: Ticket,
        result: Result<SettingsSaveResponse, ServiceError>,
    ) -> Result<(), SessionError> {
        self.settle(ticket)?;
        let response = result.map_err(|e| self.fail("Error saving settings", e))?;
        let message = response
            .message
            .unwrap_or_else(|| "Settings saved successfully".to_string());
        self.notify(NoticeLevel::Success, message);
        Ok(())
    }

    pub fn hover_span(&mut self, pass: RenderPass, span_id: &str) -> bool {
        self.sync.hover_span(pass, span_id, &mut self.surface)
    }

    pub fn hover_cell(&mut self, pass: RenderPass, row: &str, column: &str) -> bool {
        self.sync.hover_cell(pass, row, column, &mut self.surface)
    }

    pub fn hover_exit(&mut self, pass: RenderPass) -> bool {
        self.sync.hover_exit(pass, &mut self.surface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::{HighlightKind, HighlightTarget};
    use serde_json::json;

    fn response() -> FileDetailsResponse {
        serde_json::from_value(json!({
            "details": {"rows": 5, "columns": 5},
            "table": {
                "columns": ["Category", "Q1", "Q3", "Q4"],
                "data": [
                    {"Category": "Category A", "Q1": 100, "Q3": 120, "Q4": 130},
                    {"Category": "Category C", "Q1": 200, "Q3": 210, "Q4": 220},
                    {"Category": "Category E", "Q1": 180, "Q3": 190, "Q4": 200}
                ]
            },
            "selected_cells": [["Category A", "Q1", 100], ["Category C", "Q3", 210]],
            "contributing_columns": ["Q3", "Nope"],
            "top_n": 4,
            "commentary": "Cell Category A, Q1 fell while Category C, Q3 grew."
        }))
        .unwrap()
    }

    fn ready() -> Session {
        let mut session = Session::default();
        let (ticket, _) = session.select_file("financial_data_2023.csv").unwrap();
        session.complete_file_load(ticket, Ok(response())).unwrap();
        session
    }

    #[test]
    fn load_applies_response_and_links_commentary() {
        let session = ready();
        assert_eq!(
            session.state(),
            &LifecycleState::Ready {
                filename: "financial_data_2023.csv".to_string()
            }
        );
        assert_eq!(session.selection().len(), 2);
        assert_eq!(session.selection().original().len(), 2);
        assert_eq!(session.contributing_columns(), &["Q3".to_string()]);
        assert_eq!(session.top_n(), 4);
        assert!(!session.is_pending(RequestKind::FileLoad));

        let index = session.annotation().index();
        assert!(index.contains_span("cell-ref-0"));
        assert!(index.contains_span("cell-ref-1-simple"));
        assert_eq!(session.surface().selected().len(), 2);
    }

    #[test]
    fn top_n_defaults_when_missing_or_invalid() {
        for top_n in [json!(null), json!(0), json!(-2)] {
            let mut response = serde_json::to_value(response()).unwrap();
            response["top_n"] = top_n;
            let response: FileDetailsResponse = serde_json::from_value(response).unwrap();

            let mut session = Session::default();
            let (ticket, _) = session.select_file("f").unwrap();
            session.complete_file_load(ticket, Ok(response)).unwrap();
            assert_eq!(session.top_n(), DEFAULT_TOP_N);
        }
    }

    #[test]
    fn toggle_relinks_commentary() {
        let mut session = ready();
        let pass = session.render_pass();

        let membership = session.toggle_cell("Category C", "Q3", "210").unwrap();
        assert_eq!(membership, Membership::Unselected);
        assert!(!session.annotation().index().contains_span("cell-ref-1-simple"));
        assert!(session.render_pass() > pass);
        assert_eq!(session.surface().selected().len(), 1);

        session.toggle_cell("Category C", "Q3", "210").unwrap();
        assert!(session.annotation().index().contains_span("cell-ref-1-simple"));
    }

    #[test]
    fn malformed_toggle_is_skipped() {
        let mut session = ready();
        let before = session.selection().clone();

        assert!(matches!(
            session.toggle_cell("Category A", "Q1", "abc"),
            Err(SessionError::InvalidCell(_))
        ));
        assert!(matches!(
            session.toggle_cell("", "Q1", "1"),
            Err(SessionError::InvalidCell(_))
        ));
        assert!(matches!(
            session.toggle_cell("Category Z", "Q1", "1"),
            Err(SessionError::UnknownCell { .. })
        ));
        assert_eq!(session.selection(), &before);
        assert!(session.notices().is_empty());
    }

    #[test]
    fn grouped_string_cell_is_selectable() {
        let mut response = response();
        response.table = serde_json::from_value(json!({
            "columns": ["Category", "Q2"],
            "data": [{"Category": "Category A", "Q2": "1,250.75"}]
        }))
        .unwrap();
        response.selected_cells.clear();
        response.commentary = "Category A, Q2 is the largest amount.".to_string();

        let mut session = Session::default();
        let (ticket, _) = session.select_file("f").unwrap();
        session.complete_file_load(ticket, Ok(response)).unwrap();

        let membership = session.toggle_cell("Category A", "Q2", "1,250.75").unwrap();
        assert_eq!(membership, Membership::Selected);
        assert_eq!(
            session.selection().cells(),
            &[Cell::create("Category A", "Q2", 1250.75)]
        );
        assert!(session.annotation().index().contains_span("cell-ref-0-simple"));
    }

    #[test]
    fn clear_and_reset_notify() {
        let mut session = ready();

        session.clear_selection().unwrap();
        assert!(session.selection().is_empty());
        assert!(session.annotation().index().is_empty());

        session.reset_selection().unwrap();
        assert_eq!(session.selection().len(), 2);

        let notices = session.drain_notices();
        assert_eq!(
            notices.iter().map(|n| n.message.as_str()).collect::<Vec<_>>(),
            vec!["Selection cleared.", "Selection reset to original."]
        );
        assert!(session.notices().is_empty());
    }

    #[test]
    fn reset_without_original_warns() {
        let mut response = response();
        response.selected_cells.clear();
        let mut session = Session::default();
        let (ticket, _) = session.select_file("f").unwrap();
        session.complete_file_load(ticket, Ok(response)).unwrap();

        assert_eq!(session.reset_selection(), Err(SessionError::NothingToReset));
        assert_eq!(session.notices()[0].level, NoticeLevel::Warning);
    }

    #[test]
    fn operations_require_ready() {
        let mut session = Session::default();
        assert_eq!(session.clear_selection(), Err(SessionError::NotReady));
        assert_eq!(
            session.begin_commentary_refresh().map(|_| ()),
            Err(SessionError::NotReady)
        );
        assert_eq!(session.toggle_cell("A", "Q1", "1"), Err(SessionError::NotReady));
        assert_eq!(session.select_file("  ").map(|_| ()), Err(SessionError::EmptyFilename));
    }

    #[test]
    fn top_n_must_be_positive() {
        let mut session = ready();
        assert_eq!(session.set_top_n(0), Err(SessionError::InvalidTopN(0)));
        assert_eq!(session.set_top_n(-1), Err(SessionError::InvalidTopN(-1)));
        session.set_top_n(7).unwrap();
        assert_eq!(session.top_n(), 7);
    }

    #[test]
    fn refresh_round_trip_replaces_commentary() {
        let mut session = ready();
        let (ticket, request) = session.begin_commentary_refresh().unwrap();
        assert_eq!(request.selected_cells.len(), 2);
        assert_eq!(request.top_n, 4);
        assert!(session.is_pending(RequestKind::CommentaryRefresh));

        assert_eq!(
            session.begin_commentary_refresh().map(|_| ()),
            Err(SessionError::Busy(RequestKind::CommentaryRefresh))
        );
        // Unrelated interactions stay live.
        session.toggle_cell("Category E", "Q4", "200").unwrap();

        session
            .complete_commentary_refresh(
                ticket,
                Ok(CommentaryResponse {
                    commentary: "Category E, Q4 leads.".to_string(),
                }),
            )
            .unwrap();
        assert!(!session.is_pending(RequestKind::CommentaryRefresh));
        assert_eq!(session.commentary(), "Category E, Q4 leads.");
        assert!(session.annotation().index().contains_span("cell-ref-2-simple"));
    }

    #[test]
    fn failed_refresh_keeps_state_and_reenables() {
        let mut session = ready();
        let before = session.commentary().to_string();
        let (ticket, _) = session.begin_commentary_refresh().unwrap();

        let err = session
            .complete_commentary_refresh(ticket, Err(ServiceError::Application("LLM down".into())))
            .unwrap_err();
        assert_eq!(err, SessionError::Service(ServiceError::Application("LLM down".into())));
        assert_eq!(session.commentary(), before);
        assert!(!session.is_pending(RequestKind::CommentaryRefresh));
        assert_eq!(session.notices().last().unwrap().level, NoticeLevel::Danger);
    }

    #[test]
    fn blank_query_is_ignored() {
        let mut session = ready();
        assert_eq!(
            session.begin_commentary_modification("   ").map(|_| ()),
            Err(SessionError::EmptyQuery)
        );
        assert!(!session.is_pending(RequestKind::CommentaryModify));
    }

    #[test]
    fn settings_save_uses_collaborator_message() {
        let mut session = ready();
        session.set_contributing_columns(vec!["Q4".into(), "Q1".into(), "Q4".into()]).unwrap();
        let (ticket, request) = session.begin_settings_save().unwrap();
        assert_eq!(request.contributing_columns, vec!["Q4".to_string(), "Q1".to_string()]);

        session
            .complete_settings_save(ticket, Ok(SettingsSaveResponse { message: None }))
            .unwrap();
        assert_eq!(session.notices()[0].message, "Settings saved successfully");
    }

    #[test]
    fn hover_goes_through_current_pass() {
        let mut session = ready();
        let pass = session.render_pass();

        assert!(session.hover_cell(pass, "Category A", "Q1"));
        assert!(session
            .surface()
            .is_lit(HighlightKind::Hover, &HighlightTarget::span("cell-ref-0")));

        session.clear_selection().unwrap();
        assert!(session.surface().hovered().is_empty());
        assert!(!session.hover_span(pass, "cell-ref-0"));
        assert!(!session.hover_exit(pass));
    }
}

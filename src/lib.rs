/*!
# Cell Reference Commentary

A browser-facing engine that links a tabular financial summary to the narrative
commentary written about it, built in Rust.

## Overview

A user inspects a summary table (rows × columns of named values), selects a sparse
subset of cells as evidence, and reads or edits a commentary that mentions those cells
by coordinate (`"Cell Category A, Q1"` or just `"Category A, Q1"`). This crate keeps
the table and the text consistent with each other: every mention of a selected cell in
the text becomes an annotated span, and hovering either side lights up the other.

## Architecture

### Core (always compiled)
- **Selection Set** - ordered, duplicate-free set of selected cells with a reset snapshot
- **Coordinate Reference Matcher** - finds cell coordinates in the commentary and wraps them
- **Cross-Reference Index** - span id ↔ cell lookup rebuilt on every annotation pass
- **Highlight Synchronizer** - hover linking between table cells and text spans
- **Session State Controller** - `Idle → Loading → Ready` lifecycle owning all state

### Web layer (`web` feature)
- **Backend** - the data provider / commentary generator, over HTTP or from fixtures
- **App** - axum router exposing the session to the browser
- **Config** - command line and environment configuration

The server is single-user: it owns one `Session`, and every client talks to
that same session. Two browsers open on the same server share one selection
and one loaded file.

## Modules

- **cell**: Cell identity and validation of raw interaction input
- **selection**: Selection Set and Original Selection snapshot
- **matcher**: Coordinate reference matching and annotated commentary rendering
- **xref**: Cross-Reference Index
- **highlight**: Highlight targets, the presentation interface and the synchronizer
- **table**: Summary table model
- **protocol**: Request/response payloads exchanged with the backend
- **session**: Session State Controller
- **error**: Error taxonomy

## REST API Endpoints

- `/api/files` - Lists available files
- `/api/file_details` - Loads a file and its initial selection
- `/api/toggle`, `/api/clear`, `/api/reset` - Selection edits
- `/api/settings`, `/api/save_settings` - Contributing columns and top-N
- `/api/update_commentary`, `/api/modify_commentary` - Commentary regeneration
- `/api/hover`, `/api/hover_exit` - Highlight linking
- `/api/view` - Current presentable state
*/

pub mod cell;
pub mod error;
pub mod highlight;
pub mod matcher;
pub mod protocol;
pub mod selection;
pub mod session;
pub mod table;
pub mod xref;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod backend;
#[cfg(feature = "web")]
pub mod config;

/// Re-export the core types to make them easier to use
pub use cell::*;
pub use error::*;
pub use highlight::*;
pub use matcher::*;
pub use protocol::*;
pub use selection::*;
pub use session::*;
pub use table::*;
pub use xref::*;

use thiserror::Error;

use crate::session::{Generation, RequestKind};

/// Malformed cell data coming from an interaction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CellError {
    #[error("cell is missing its row label")]
    MissingRow,

    #[error("cell is missing its column label")]
    MissingColumn,

    #[error("cell value {0:?} is not numeric")]
    NonNumericValue(String),
}

/// Failures reported by, or while talking to, an external collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Network or HTTP-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The collaborator answered with an explicit `{"error": ...}` payload.
    #[error("{0}")]
    Application(String),

    /// The collaborator answered with a body we could not read.
    #[error("invalid response: {0}")]
    Decode(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("no file is loaded")]
    NotReady,

    #[error("no file selected")]
    EmptyFilename,

    #[error("a {0} request is already in flight")]
    Busy(RequestKind),

    #[error("no original selection to reset to")]
    NothingToReset,

    #[error("top-N must be a positive integer, got {0}")]
    InvalidTopN(i64),

    #[error("no query provided")]
    EmptyQuery,

    #[error("invalid cell: {0}")]
    InvalidCell(#[from] CellError),

    #[error("cell ({row}, {column}) is not part of the summary table")]
    UnknownCell { row: String, column: String },

    #[error("discarded {kind} response from generation {got} (current {current})")]
    StaleResponse {
        kind: RequestKind,
        got: Generation,
        current: Generation,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),
}

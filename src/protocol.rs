//! Payloads exchanged with the data provider and commentary generator.
//!
//! Every request carries a `timestamp` (milliseconds since the epoch) so that
//! intermediaries never serve a cached answer. Every response may instead be an
//! `{"error": "..."}` envelope, which is always a failed operation.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::cell::Cell;
use crate::error::ServiceError;
use crate::table::SummaryTable;

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileDetailsRequest {
    pub filename: String,
    pub timestamp: i64,
}

/// Summary statistics about the file, shown as badges. All optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_records: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileDetailsResponse {
    #[serde(default)]
    pub details: Option<FileDetails>,
    #[serde(default)]
    pub table: SummaryTable,
    #[serde(default, deserialize_with = "lenient_cells")]
    pub selected_cells: Vec<Cell>,
    #[serde(default)]
    pub contributing_columns: Vec<String>,
    #[serde(default)]
    pub top_n: Option<i64>,
    #[serde(default)]
    pub commentary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommentaryRefreshRequest {
    pub selected_cells: Vec<Cell>,
    pub contributing_columns: Vec<String>,
    pub top_n: u32,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommentaryModifyRequest {
    pub query: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommentaryResponse {
    pub commentary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SettingsSaveRequest {
    pub contributing_columns: Vec<String>,
    pub top_n: u32,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SettingsSaveResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// A collaborator reply: either the expected payload or an error envelope.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Reply<T> {
    Failure { error: String },
    Success(T),
}

impl<T> Reply<T> {
    pub fn into_result(self) -> Result<T, ServiceError> {
        match self {
            Reply::Failure { error } => Err(ServiceError::Application(error)),
            Reply::Success(payload) => Ok(payload),
        }
    }
}

/// Parses a reply body, treating an error envelope as a failure.
pub fn parse_reply<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, ServiceError> {
    serde_json::from_str::<Reply<T>>(body)
        .map_err(|e| ServiceError::Decode(e.to_string()))?
        .into_result()
}

/// Accepts the provider's selection and drops entries that are not a valid
/// `[row, column, value]` triple instead of failing the whole load.
fn lenient_cells<'de, D>(deserializer: D) -> Result<Vec<Cell>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<Cell>(entry.clone()) {
            Ok(cell) => Some(cell),
            Err(e) => {
                log::warn!("Skipping malformed selected cell {}: {}", entry, e);
                None
            }
        })
        .collect())
}

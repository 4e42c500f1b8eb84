//! External collaborators: the data provider and the commentary generator.
//!
//! [`HttpBackend`] talks to a running service over HTTP; [`FixtureBackend`] answers
//! from JSON payloads held in memory (the built-in demo set or a directory of
//! `<name>.json` files) so the server runs stand-alone.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::cell::Cell;
use crate::error::ServiceError;
use crate::protocol::{
    parse_reply, CommentaryModifyRequest, CommentaryRefreshRequest, CommentaryResponse,
    FileDetails, FileDetailsRequest, FileDetailsResponse, Reply, SettingsSaveRequest,
    SettingsSaveResponse,
};
use crate::session::DEFAULT_TOP_N;
use crate::table::SummaryTable;

#[async_trait]
pub trait Backend: Send + Sync {
    async fn list_files(&self) -> Result<Vec<String>, ServiceError>;

    async fn file_details(&self, request: &FileDetailsRequest) -> Result<FileDetailsResponse, ServiceError>;

    async fn update_commentary(
        &self,
        request: &CommentaryRefreshRequest,
    ) -> Result<CommentaryResponse, ServiceError>;

    async fn modify_commentary(
        &self,
        request: &CommentaryModifyRequest,
    ) -> Result<CommentaryResponse, ServiceError>;

    async fn save_settings(&self, request: &SettingsSaveRequest) -> Result<SettingsSaveResponse, ServiceError>;
}

/// Client for the upstream service. The service keeps the current file and
/// commentary in a cookie session, so the client carries a cookie store.
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        Ok(HttpBackend {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ServiceError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        read_response(response).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ServiceError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        read_response(response).await
    }
}

async fn read_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ServiceError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ServiceError::Transport(e.to_string()))?;

    if !status.is_success() {
        // Prefer the service's own explanation over the bare status.
        if let Ok(Reply::Failure { error }) = serde_json::from_str::<Reply<serde_json::Value>>(&body) {
            return Err(ServiceError::Application(error));
        }
        return Err(ServiceError::Transport(format!(
            "HTTP error! Status: {}",
            status.as_u16()
        )));
    }

    parse_reply(&body)
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list_files(&self) -> Result<Vec<String>, ServiceError> {
        self.get("/api/files").await
    }

    async fn file_details(&self, request: &FileDetailsRequest) -> Result<FileDetailsResponse, ServiceError> {
        self.post("/api/file_details", request).await
    }

    async fn update_commentary(
        &self,
        request: &CommentaryRefreshRequest,
    ) -> Result<CommentaryResponse, ServiceError> {
        self.post("/api/update_commentary", request).await
    }

    async fn modify_commentary(
        &self,
        request: &CommentaryModifyRequest,
    ) -> Result<CommentaryResponse, ServiceError> {
        self.post("/api/modify_commentary", request).await
    }

    async fn save_settings(&self, request: &SettingsSaveRequest) -> Result<SettingsSaveResponse, ServiceError> {
        self.post("/api/save_settings", request).await
    }
}

#[derive(Debug, Clone, PartialEq)]
struct SavedSettings {
    contributing_columns: Vec<String>,
    top_n: u32,
}

#[derive(Debug, Default)]
struct FixtureState {
    current_file: Option<String>,
    commentary: String,
    settings: BTreeMap<String, SavedSettings>,
}

/// In-process backend answering from fixture payloads.
///
/// Each fixture is a file-details payload. A fixture with an empty `commentary`
/// gets one generated from its selected cells. Saved settings override the
/// fixture's own for later loads of the same file.
pub struct FixtureBackend {
    files: BTreeMap<String, FileDetailsResponse>,
    state: Mutex<FixtureState>,
}

impl FixtureBackend {
    pub fn new(files: BTreeMap<String, FileDetailsResponse>) -> Self {
        FixtureBackend {
            files,
            state: Mutex::new(FixtureState::default()),
        }
    }

    /// The sample data set: three files sharing one "Category A..E × Q1..Q4" table.
    pub fn demo() -> Self {
        let table = demo_table();
        let selected_cells = vec![
            Cell::create("Category A", "Q1", 100.0),
            Cell::create("Category C", "Q3", 210.0),
            Cell::create("Category E", "Q4", 200.0),
        ];
        let details = FileDetails {
            rows: Some(1000),
            columns: Some(15),
            avg_amount: Some(1250.75),
            min_amount: Some(100.25),
            max_amount: Some(9999.99),
            total_records: Some(1000),
        };

        let files = ["financial_data_2023.csv", "revenue_report_q2.csv", "expense_analysis.csv"]
            .into_iter()
            .map(|name| {
                let payload = FileDetailsResponse {
                    details: Some(details.clone()),
                    table: table.clone(),
                    selected_cells: selected_cells.clone(),
                    contributing_columns: Vec::new(),
                    top_n: Some(i64::from(DEFAULT_TOP_N)),
                    commentary: String::new(),
                };
                (name.to_string(), payload)
            })
            .collect();

        FixtureBackend::new(files)
    }

    /// Loads every `*.json` file in `dir` as a fixture named after the file stem.
    pub fn from_dir(dir: &Path) -> io::Result<Self> {
        let mut files = BTreeMap::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let text = std::fs::read_to_string(&path)?;
            let payload: FileDetailsResponse = serde_json::from_str(&text).map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("{}: {}", path.display(), e),
                )
            })?;
            log::debug!("Loaded fixture {} from {}", name, path.display());
            files.insert(name.to_string(), payload);
        }

        log::info!("Loaded {} fixture files from {}", files.len(), dir.display());
        Ok(FixtureBackend::new(files))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FixtureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn demo_table() -> SummaryTable {
    let rows = [
        ("Category A", [100, 110, 120, 130]),
        ("Category B", [150, 140, 160, 170]),
        ("Category C", [200, 190, 210, 220]),
        ("Category D", [120, 130, 140, 150]),
        ("Category E", [180, 170, 190, 200]),
    ];
    let quarters = ["Q1", "Q2", "Q3", "Q4"];

    let mut columns = vec!["Category".to_string()];
    columns.extend(quarters.iter().map(|q| q.to_string()));

    let data = rows
        .iter()
        .map(|(label, values)| {
            let mut record = serde_json::Map::new();
            record.insert("Category".to_string(), serde_json::Value::from(*label));
            for (quarter, value) in quarters.iter().zip(values) {
                record.insert(quarter.to_string(), serde_json::Value::from(*value));
            }
            record
        })
        .collect();

    SummaryTable { columns, data }
}

fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// Writes one numbered paragraph per selected cell, each naming its cell as
/// `Cell <row>, <column>` so the text links back to the table.
pub fn generate_commentary(
    table: &SummaryTable,
    cells: &[Cell],
    contributing_columns: &[String],
    top_n: u32,
) -> String {
    if cells.is_empty() {
        return "No cells are selected. Select cells in the summary table to explain them.".to_string();
    }

    let mut commentary = String::from("Based on the analysis, we can observe the following trends:");

    for (i, cell) in cells.iter().enumerate() {
        let mut contributors: Vec<(&str, f64)> = contributing_columns
            .iter()
            .filter(|column| **column != cell.column)
            .filter_map(|column| Some((column.as_str(), table.value_at(&cell.row, column)?)))
            .collect();
        contributors.sort_by(|a, b| b.1.total_cmp(&a.1));
        contributors.truncate(top_n as usize);

        commentary.push_str(&format!(
            "\n\n{}. Cell {}, {} stands at {}",
            i + 1,
            cell.row,
            cell.column,
            format_amount(cell.value)
        ));
        if contributors.is_empty() {
            commentary.push('.');
        } else {
            let listed: Vec<String> = contributors
                .iter()
                .map(|(column, value)| format!("{} ({})", column, format_amount(*value)))
                .collect();
            commentary.push_str(&format!(", alongside {}.", listed.join(", ")));
        }
    }

    commentary
}

#[async_trait]
impl Backend for FixtureBackend {
    async fn list_files(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self.files.keys().cloned().collect())
    }

    async fn file_details(&self, request: &FileDetailsRequest) -> Result<FileDetailsResponse, ServiceError> {
        if request.filename.is_empty() {
            return Err(ServiceError::Application("No filename provided".to_string()));
        }
        let mut payload = self
            .files
            .get(&request.filename)
            .cloned()
            .ok_or_else(|| ServiceError::Application(format!("File not found: {}", request.filename)))?;

        let mut state = self.lock();
        if let Some(saved) = state.settings.get(&request.filename) {
            payload.contributing_columns = saved.contributing_columns.clone();
            payload.top_n = Some(i64::from(saved.top_n));
        }
        if payload.commentary.is_empty() {
            let top_n = payload
                .top_n
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_TOP_N);
            payload.commentary = generate_commentary(
                &payload.table,
                &payload.selected_cells,
                &payload.contributing_columns,
                top_n,
            );
        }

        state.current_file = Some(request.filename.clone());
        state.commentary = payload.commentary.clone();
        log::debug!("Serving fixture {}", request.filename);
        Ok(payload)
    }

    async fn update_commentary(
        &self,
        request: &CommentaryRefreshRequest,
    ) -> Result<CommentaryResponse, ServiceError> {
        let mut state = self.lock();
        let table = state
            .current_file
            .as_ref()
            .and_then(|name| self.files.get(name))
            .map(|payload| payload.table.clone())
            .unwrap_or_default();

        let commentary = generate_commentary(
            &table,
            &request.selected_cells,
            &request.contributing_columns,
            request.top_n,
        );
        state.commentary = commentary.clone();
        Ok(CommentaryResponse { commentary })
    }

    async fn modify_commentary(
        &self,
        request: &CommentaryModifyRequest,
    ) -> Result<CommentaryResponse, ServiceError> {
        if request.query.is_empty() {
            return Err(ServiceError::Application("No query provided".to_string()));
        }
        let mut state = self.lock();
        let commentary = format!("{}\n\nUpdated based on query: {}", state.commentary, request.query);
        state.commentary = commentary.clone();
        Ok(CommentaryResponse { commentary })
    }

    async fn save_settings(&self, request: &SettingsSaveRequest) -> Result<SettingsSaveResponse, ServiceError> {
        let mut state = self.lock();
        let Some(filename) = state.current_file.clone() else {
            return Err(ServiceError::Application("No file selected".to_string()));
        };
        state.settings.insert(
            filename,
            SavedSettings {
                contributing_columns: request.contributing_columns.clone(),
                top_n: request.top_n,
            },
        );
        Ok(SettingsSaveResponse {
            message: Some("Settings saved successfully".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::now_millis;

    fn details_request(filename: &str) -> FileDetailsRequest {
        FileDetailsRequest {
            filename: filename.to_string(),
            timestamp: now_millis(),
        }
    }

    #[tokio::test]
    async fn demo_serves_sample_data() {
        let backend = FixtureBackend::demo();
        let files = backend.list_files().await.unwrap();
        assert_eq!(files.len(), 3);
        assert!(files.contains(&"financial_data_2023.csv".to_string()));

        let payload = backend
            .file_details(&details_request("financial_data_2023.csv"))
            .await
            .unwrap();
        assert_eq!(payload.selected_cells.len(), 3);
        assert_eq!(payload.table.value_at("Category C", "Q3"), Some(210.0));
        assert!(payload.commentary.contains("Cell Category A, Q1 stands at 100"));
        assert!(payload.commentary.contains("Cell Category E, Q4"));
    }

    #[tokio::test]
    async fn unknown_file_is_an_application_error() {
        let backend = FixtureBackend::demo();
        let err = backend.file_details(&details_request("missing.csv")).await.unwrap_err();
        assert_eq!(err, ServiceError::Application("File not found: missing.csv".to_string()));
    }

    #[tokio::test]
    async fn modify_appends_query() {
        let backend = FixtureBackend::demo();
        let payload = backend
            .file_details(&details_request("expense_analysis.csv"))
            .await
            .unwrap();

        let reply = backend
            .modify_commentary(&CommentaryModifyRequest {
                query: "shorter".to_string(),
                timestamp: now_millis(),
            })
            .await
            .unwrap();
        assert_eq!(
            reply.commentary,
            format!("{}\n\nUpdated based on query: shorter", payload.commentary)
        );
    }

    #[tokio::test]
    async fn settings_need_a_file_and_persist_per_file() {
        let backend = FixtureBackend::demo();
        let request = SettingsSaveRequest {
            contributing_columns: vec!["Q2".to_string()],
            top_n: 1,
            timestamp: now_millis(),
        };
        assert_eq!(
            backend.save_settings(&request).await.unwrap_err(),
            ServiceError::Application("No file selected".to_string())
        );

        backend
            .file_details(&details_request("revenue_report_q2.csv"))
            .await
            .unwrap();
        let reply = backend.save_settings(&request).await.unwrap();
        assert_eq!(reply.message.as_deref(), Some("Settings saved successfully"));

        let payload = backend
            .file_details(&details_request("revenue_report_q2.csv"))
            .await
            .unwrap();
        assert_eq!(payload.contributing_columns, vec!["Q2".to_string()]);
        assert_eq!(payload.top_n, Some(1));
        assert!(payload.commentary.contains("alongside Q2 (110)"));
    }

    #[test]
    fn commentary_ranks_contributors() {
        let table = demo_table();
        let text = generate_commentary(
            &table,
            &[Cell::create("Category C", "Q3", 210.0)],
            &["Q1".to_string(), "Q4".to_string(), "Q2".to_string(), "Q3".to_string()],
            2,
        );
        assert!(text.ends_with("1. Cell Category C, Q3 stands at 210, alongside Q4 (220), Q1 (200)."));
    }

    #[test]
    fn loads_fixture_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("sales.json"),
            r#"{
                "table": {"columns": ["Region", "Jan"], "data": [{"Region": "North", "Jan": 5}]},
                "selected_cells": [["North", "Jan", 5]],
                "commentary": "North, Jan is flat."
            }"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let backend = FixtureBackend::from_dir(dir.path()).unwrap();
        assert_eq!(backend.files.keys().collect::<Vec<_>>(), vec!["sales"]);
    }

    #[test]
    fn broken_fixture_is_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();

        let err = FixtureBackend::from_dir(dir.path()).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::backend::Backend;
use crate::cell::Cell;
use crate::config::Config;
use crate::error::SessionError;
use crate::highlight::{HighlightSet, HighlightTarget, RenderPass};
use crate::protocol::FileDetails;
use crate::session::{Generation, LifecycleState, Notice, RequestKind, Session};
use crate::table::SummaryTable;
use crate::xref::CrossRefIndex;

/// Shared server state. There is exactly one session; all clients drive it.
pub struct AppState {
    session: Mutex<Session>,
    backend: Arc<dyn Backend>,
}

impl AppState {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        AppState {
            session: Mutex::new(Session::default()),
            backend,
        }
    }

    /// The session lock is never held across an await point.
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Deserialize)]
struct FileSelection {
    #[serde(default)]
    filename: String,
}

#[derive(Deserialize)]
struct ToggleRequest {
    row: String,
    col: String,
    value: Value,
}

#[derive(Deserialize)]
struct SettingsUpdate {
    contributing_columns: Option<Vec<String>>,
    top_n: Option<i64>,
}

#[derive(Deserialize)]
struct ModifyRequest {
    #[serde(default)]
    query: String,
}

#[derive(Deserialize)]
struct HoverRequest {
    pass: RenderPass,
    span_id: Option<String>,
    row: Option<String>,
    col: Option<String>,
}

#[derive(Deserialize)]
struct HoverExitRequest {
    pass: RenderPass,
}

#[derive(Serialize)]
struct HoverResponse {
    applied: bool,
    hovered: Vec<HighlightTarget>,
}

/// Everything the browser needs to draw the page. Building it drains the
/// session's notices.
#[derive(Serialize)]
pub struct View {
    pub lifecycle: LifecycleState,
    pub generation: Generation,
    pub details: Option<FileDetails>,
    pub table: SummaryTable,
    pub selected_cells: Vec<Cell>,
    pub original_cells: Vec<Cell>,
    pub contributing_columns: Vec<String>,
    pub top_n: u32,
    pub commentary: String,
    pub commentary_html: String,
    pub references: CrossRefIndex,
    pub render_pass: RenderPass,
    pub highlights: HighlightSet,
    pub pending: Vec<RequestKind>,
    pub notices: Vec<Notice>,
}

impl View {
    fn of(session: &mut Session) -> Self {
        View {
            lifecycle: session.state().clone(),
            generation: session.generation(),
            details: session.details().cloned(),
            table: session.table().clone(),
            selected_cells: session.selection().cells().to_vec(),
            original_cells: session.selection().original().to_vec(),
            contributing_columns: session.contributing_columns().to_vec(),
            top_n: session.top_n(),
            commentary: session.commentary().to_string(),
            commentary_html: session.commentary_html(),
            references: session.annotation().index().clone(),
            render_pass: session.render_pass(),
            highlights: session.surface().clone(),
            pending: session.pending().collect(),
            notices: session.drain_notices(),
        }
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status = match &self {
            SessionError::NotReady
            | SessionError::Busy(_)
            | SessionError::NothingToReset
            | SessionError::StaleResponse { .. } => StatusCode::CONFLICT,
            SessionError::EmptyFilename
            | SessionError::InvalidTopN(_)
            | SessionError::EmptyQuery
            | SessionError::InvalidCell(_)
            | SessionError::UnknownCell { .. } => StatusCode::BAD_REQUEST,
            SessionError::Service(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

type ViewResult = Result<Json<View>, SessionError>;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/api/files", get(list_files))
        .route("/api/file_details", post(file_details))
        .route("/api/view", get(get_view))
        .route("/api/toggle", post(toggle_cell))
        .route("/api/clear", post(clear_selection))
        .route("/api/reset", post(reset_selection))
        .route("/api/settings", post(update_settings))
        .route("/api/update_commentary", post(update_commentary))
        .route("/api/modify_commentary", post(modify_commentary))
        .route("/api/save_settings", post(save_settings))
        .route("/api/hover", post(hover))
        .route("/api/hover_exit", post(hover_exit))
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let backend = config.backend()?;
    let app_state = Arc::new(AppState::new(backend));

    let mut app = router(app_state);
    if let Some(dir) = &config.static_dir {
        app = app.nest_service("/static", ServeDir::new(dir));
    }
    let app = app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let listener = TcpListener::bind(config.bind).await?;
    log::info!("Listening on http://{}", config.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_index() -> Html<&'static str> {
    Html(include_str!("./static/index.html"))
}

async fn list_files(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>, SessionError> {
    let files = state.backend.list_files().await.map_err(|e| {
        log::error!("Error loading files: {}", e);
        SessionError::Service(e)
    })?;
    Ok(Json(files))
}

async fn get_view(State(state): State<Arc<AppState>>) -> Json<View> {
    Json(View::of(&mut state.session()))
}

async fn file_details(State(state): State<Arc<AppState>>, Json(payload): Json<FileSelection>) -> ViewResult {
    let (ticket, request) = state.session().select_file(&payload.filename)?;
    let result = state.backend.file_details(&request).await;

    let mut session = state.session();
    session.complete_file_load(ticket, result)?;
    Ok(Json(View::of(&mut session)))
}

async fn toggle_cell(State(state): State<Arc<AppState>>, Json(payload): Json<ToggleRequest>) -> ViewResult {
    let value = match &payload.value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    let mut session = state.session();
    session.toggle_cell(&payload.row, &payload.col, &value)?;
    Ok(Json(View::of(&mut session)))
}

async fn clear_selection(State(state): State<Arc<AppState>>) -> ViewResult {
    let mut session = state.session();
    session.clear_selection()?;
    Ok(Json(View::of(&mut session)))
}

async fn reset_selection(State(state): State<Arc<AppState>>) -> ViewResult {
    let mut session = state.session();
    session.reset_selection()?;
    Ok(Json(View::of(&mut session)))
}

async fn update_settings(State(state): State<Arc<AppState>>, Json(payload): Json<SettingsUpdate>) -> ViewResult {
    let mut session = state.session();
    if let Some(top_n) = payload.top_n {
        session.set_top_n(top_n)?;
    }
    if let Some(columns) = payload.contributing_columns {
        session.set_contributing_columns(columns)?;
    }
    Ok(Json(View::of(&mut session)))
}

async fn update_commentary(State(state): State<Arc<AppState>>) -> ViewResult {
    let (ticket, request) = state.session().begin_commentary_refresh()?;
    let result = state.backend.update_commentary(&request).await;

    let mut session = state.session();
    session.complete_commentary_refresh(ticket, result)?;
    Ok(Json(View::of(&mut session)))
}

async fn modify_commentary(State(state): State<Arc<AppState>>, Json(payload): Json<ModifyRequest>) -> ViewResult {
    let (ticket, request) = state.session().begin_commentary_modification(&payload.query)?;
    let result = state.backend.modify_commentary(&request).await;

    let mut session = state.session();
    session.complete_commentary_modification(ticket, result)?;
    Ok(Json(View::of(&mut session)))
}

async fn save_settings(State(state): State<Arc<AppState>>) -> ViewResult {
    let (ticket, request) = state.session().begin_settings_save()?;
    let result = state.backend.save_settings(&request).await;

    let mut session = state.session();
    session.complete_settings_save(ticket, result)?;
    Ok(Json(View::of(&mut session)))
}

async fn hover(State(state): State<Arc<AppState>>, Json(payload): Json<HoverRequest>) -> impl IntoResponse {
    let mut session = state.session();
    let applied = match (&payload.span_id, &payload.row, &payload.col) {
        (Some(span_id), _, _) => session.hover_span(payload.pass, span_id),
        (None, Some(row), Some(col)) => session.hover_cell(payload.pass, row, col),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "hover needs a span_id or a row and col" })),
            )
                .into_response();
        }
    };

    Json(HoverResponse {
        applied,
        hovered: session.surface().hovered().iter().cloned().collect(),
    })
    .into_response()
}

async fn hover_exit(State(state): State<Arc<AppState>>, Json(payload): Json<HoverExitRequest>) -> Json<HoverResponse> {
    let mut session = state.session();
    let applied = session.hover_exit(payload.pass);
    Json(HoverResponse {
        applied,
        hovered: session.surface().hovered().iter().cloned().collect(),
    })
}

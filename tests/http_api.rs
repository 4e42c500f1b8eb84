#![cfg(feature = "web")]

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use cellref::app::{AppState, router};
use cellref::backend::FixtureBackend;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Router {
    router(Arc::new(AppState::new(Arc::new(FixtureBackend::demo()))))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = match body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    };
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn load(app: &Router) -> Value {
    let (status, view) = send(
        app,
        Method::POST,
        "/api/file_details",
        Some(json!({"filename": "financial_data_2023.csv"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    view
}

fn notice_messages(view: &Value) -> Vec<String> {
    view["notices"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["message"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn lists_files() {
    let (status, files) = send(&app(), Method::GET, "/api/files", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(files.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn loading_a_file_links_the_commentary() {
    let app = app();
    let view = load(&app).await;

    assert_eq!(view["lifecycle"]["state"], "ready");
    assert_eq!(view["lifecycle"]["filename"], "financial_data_2023.csv");
    assert_eq!(view["selected_cells"][0], json!(["Category A", "Q1", 100.0]));
    assert_eq!(view["top_n"], 3);
    assert_eq!(view["details"]["rows"], 1000);

    let references = view["references"].as_object().unwrap();
    assert_eq!(
        references.keys().collect::<Vec<_>>(),
        vec!["cell-ref-0", "cell-ref-1", "cell-ref-2"]
    );
    assert!(
        view["commentary_html"]
            .as_str()
            .unwrap()
            .contains(r#"<span id="cell-ref-1" class="cell-reference" data-row="Category C" data-col="Q3">"#)
    );
}

#[tokio::test]
async fn toggle_rebuilds_index_and_invalidates_hover_pass() {
    let app = app();
    let loaded = load(&app).await;
    let old_pass = loaded["render_pass"].clone();

    let (status, view) = send(
        &app,
        Method::POST,
        "/api/toggle",
        Some(json!({"row": "Category A", "col": "Q1", "value": 100})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["selected_cells"].as_array().unwrap().len(), 2);
    assert_eq!(view["references"].as_object().unwrap().len(), 2);
    assert_eq!(view["highlights"]["selected"].as_array().unwrap().len(), 2);

    let (_, reply) = send(
        &app,
        Method::POST,
        "/api/hover",
        Some(json!({"pass": old_pass, "row": "Category C", "col": "Q3"})),
    )
    .await;
    assert_eq!(reply["applied"], false);

    let (_, reply) = send(
        &app,
        Method::POST,
        "/api/hover",
        Some(json!({"pass": view["render_pass"], "row": "Category C", "col": "Q3"})),
    )
    .await;
    assert_eq!(reply["applied"], true);
    let hovered = reply["hovered"].as_array().unwrap();
    assert!(hovered.contains(&json!({"target": "span", "span_id": "cell-ref-0"})));
    assert!(hovered.contains(&json!({"target": "table_cell", "row": "Category C", "column": "Q3"})));

    let (_, reply) = send(
        &app,
        Method::POST,
        "/api/hover_exit",
        Some(json!({"pass": view["render_pass"]})),
    )
    .await;
    assert_eq!(reply["hovered"], json!([]));
}

#[tokio::test]
async fn clear_and_reset_report_notices() {
    let app = app();
    load(&app).await;

    let (_, view) = send(&app, Method::POST, "/api/clear", None).await;
    assert_eq!(view["selected_cells"], json!([]));
    assert_eq!(notice_messages(&view), vec!["Selection cleared."]);

    let (_, view) = send(&app, Method::POST, "/api/reset", None).await;
    assert_eq!(view["selected_cells"].as_array().unwrap().len(), 3);
    assert_eq!(notice_messages(&view), vec!["Selection reset to original."]);
}

#[tokio::test]
async fn settings_feed_commentary_refresh() {
    let app = app();
    load(&app).await;

    let (status, view) = send(
        &app,
        Method::POST,
        "/api/settings",
        Some(json!({"contributing_columns": ["Q2", "Q4", "Bogus"], "top_n": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["contributing_columns"], json!(["Q2", "Q4"]));
    assert_eq!(view["top_n"], 1);

    let (status, view) = send(&app, Method::POST, "/api/update_commentary", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        view["commentary"]
            .as_str()
            .unwrap()
            .contains("Cell Category A, Q1 stands at 100, alongside Q4 (130).")
    );
    assert_eq!(notice_messages(&view), vec!["Commentary updated successfully."]);
    assert_eq!(view["pending"], json!([]));

    let (_, view) = send(&app, Method::POST, "/api/save_settings", None).await;
    assert_eq!(notice_messages(&view), vec!["Settings saved successfully"]);
}

#[tokio::test]
async fn modify_appends_query() {
    let app = app();
    load(&app).await;

    let (status, view) = send(
        &app,
        Method::POST,
        "/api/modify_commentary",
        Some(json!({"query": "mention seasonality"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        view["commentary"]
            .as_str()
            .unwrap()
            .ends_with("\n\nUpdated based on query: mention seasonality")
    );
    assert_eq!(view["references"].as_object().unwrap().len(), 3);
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let app = app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/toggle",
        Some(json!({"row": "Category A", "col": "Q1", "value": 100})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "no file is loaded");

    load(&app).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/toggle",
        Some(json!({"row": "Category A", "col": "Q1", "value": "abc"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::POST, "/api/modify_commentary", Some(json!({"query": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::POST, "/api/settings", Some(json!({"top_n": 0}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, view) = send(&app, Method::GET, "/api/view", None).await;
    assert_eq!(view["selected_cells"].as_array().unwrap().len(), 3);
    assert_eq!(view["top_n"], 3);
}

#[tokio::test]
async fn failed_load_surfaces_a_notice_and_goes_idle() {
    let app = app();
    load(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/file_details",
        Some(json!({"filename": "missing.csv"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "File not found: missing.csv");

    let (_, view) = send(&app, Method::GET, "/api/view", None).await;
    assert_eq!(view["lifecycle"]["state"], "idle");
    assert_eq!(view["selected_cells"], json!([]));
    assert_eq!(
        notice_messages(&view),
        vec!["Error loading file details: File not found: missing.csv"]
    );
}

async fn index_page(app: &Router) -> String {
    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn settings_accept_columns_alone() {
    let app = app();
    load(&app).await;

    let (status, view) = send(
        &app,
        Method::POST,
        "/api/settings",
        Some(json!({"contributing_columns": ["Q3"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["contributing_columns"], json!(["Q3"]));
    assert_eq!(view["top_n"], 3);
    assert_eq!(view["table"]["columns"][0], "Category");
}

#[tokio::test]
async fn index_page_offers_a_column_picker() {
    let html = index_page(&app()).await;
    assert!(html.contains(r#"<select id="columns" multiple"#));
    assert!(html.contains("table.columns.slice(1)"));
    assert!(html.contains("next.contributing_columns.includes(c)"));
    assert!(html.contains("contributing_columns: Array.from("));
}

#[tokio::test]
async fn index_page_disables_buttons_while_in_flight() {
    let html = index_page(&app()).await;
    let guard = html.find("async function whileDisabled").unwrap();
    let body = &html[guard..];
    let disabled = body.find("button.disabled = true").unwrap();
    let request = body.find("await action()").unwrap();
    let restore = body.find("finally").unwrap();
    assert!(disabled < request && request < restore);

    for id in ["refresh", "modify", "save"] {
        assert!(html.contains(&format!("whileDisabled('{id}'")), "{id} is not guarded");
    }
}

#[tokio::test]
async fn all_clients_share_one_session() {
    let app = app();
    load(&app).await;
    send(&app, Method::POST, "/api/clear", None).await;

    let other_client = app.clone();
    let (_, view) = send(&other_client, Method::GET, "/api/view", None).await;
    assert_eq!(view["lifecycle"]["filename"], "financial_data_2023.csv");
    assert_eq!(view["selected_cells"], json!([]));
}

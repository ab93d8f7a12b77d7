//! Request handlers for the mock service.
//!
//! The JSON API injects artificial latency before answering; the HTML pages
//! are served without delay, matching a real app where the document loads
//! fast and the data fetches are the slow part.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::{Extension, Json};
use minijinja::context;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

use super::middleware::DelayCell;
use super::state::AppState;

/// Picks and applies the artificial latency, recording the picked value
/// into the request's delay slot for the log record.
async fn inject_delay(state: &AppState, cell: &DelayCell) -> u64 {
    let delay_ms = state.injector.inject().await;
    cell.store(delay_ms);
    delay_ms
}

pub async fn health() -> Json<Value> {
    Json(json!({"ok": true}))
}

pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Extension(cell): Extension<DelayCell>,
) -> Json<Value> {
    inject_delay(&state, &cell).await;
    Json(json!({"items": state.items}))
}

pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Extension(cell): Extension<DelayCell>,
    Path(id): Path<u64>,
) -> Response {
    inject_delay(&state, &cell).await;
    match state.find_item(id) {
        Some(item) => Json(json!({
            "item": item,
            "detail": {"description": format!("Details for item {id}")},
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "not_found", "id": id})),
        )
            .into_response(),
    }
}

pub async fn approve_item(
    State(state): State<Arc<AppState>>,
    Extension(cell): Extension<DelayCell>,
    Path(id): Path<u64>,
) -> Response {
    inject_delay(&state, &cell).await;
    match state.find_item(id) {
        Some(_) => Json(json!({"id": id, "status": "approved"})).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "not_found", "id": id})),
        )
            .into_response(),
    }
}

/// Minimal create stub: echoes the payload back.
pub async fn create_item(Json(payload): Json<Value>) -> Response {
    (StatusCode::CREATED, Json(payload)).into_response()
}

pub async fn ui_index(State(state): State<Arc<AppState>>) -> Response {
    render(&state, "index.html", context! {})
}

pub async fn ui_detail(State(state): State<Arc<AppState>>, Path(id): Path<u64>) -> Response {
    render(&state, "detail.html", context! { item_id => id })
}

fn render(state: &AppState, template: &str, ctx: minijinja::Value) -> Response {
    match state.render_page(template, ctx) {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            error!(%err, template, "template rendering failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "template error").into_response()
        }
    }
}

//! Route configuration for the mock service.

use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

use super::handlers;
use super::middleware;
use super::state::AppState;

/// Builds the full route table with the logging middleware applied.
pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/items",
            get(handlers::list_items).post(handlers::create_item),
        )
        .route("/api/items/:id", get(handlers::get_item))
        .route("/api/items/:id/approve", post(handlers::approve_item))
        .route("/", get(handlers::ui_index))
        .route("/items/:id", get(handlers::ui_detail))
        .layer(from_fn_with_state(state.clone(), middleware::request_log))
        .with_state(state)
}

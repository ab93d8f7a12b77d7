//! Request-id propagation and guaranteed request logging.
//!
//! Every response carries `X-Request-Id` (echoed from the request header if
//! present, else generated). One request-log record is emitted per request
//! in completion order, on every exit path: normal responses, error
//! responses, and handler panics (recorded as a synthetic 500).

use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};
use uuid::Uuid;

use super::log::RequestLogRecord;
use super::state::AppState;

/// Per-request slot the delay injection writes its picked value into, so
/// the log record can report it after the response resolves.
#[derive(Clone, Debug, Default)]
pub struct DelayCell(Arc<AtomicU64>);

impl DelayCell {
    pub fn store(&self, delay_ms: u64) {
        self.0.store(delay_ms, Ordering::Relaxed);
    }

    pub fn load(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-request id, available to handlers through extensions.
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

/// The logging middleware.
///
/// The record is built and appended after the inner service resolves, so
/// log order is completion order; a slow request logs after a fast one even
/// when it arrived first.
pub async fn request_log(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();

    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let query = request.uri().query().unwrap_or("").to_string();

    let delay_cell = DelayCell::default();
    request.extensions_mut().insert(delay_cell.clone());
    request.extensions_mut().insert(RequestId(request_id.clone()));

    let outcome = AssertUnwindSafe(next.run(request)).catch_unwind().await;
    let mut response = match outcome {
        Ok(response) => response,
        Err(_) => {
            error!(%request_id, %method, %path, "request handler panicked");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    };

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }

    let elapsed_ms = (started.elapsed().as_secs_f64() * 1_000_000.0).round() / 1000.0;
    let cfg = state.injector.config();
    let record = RequestLogRecord {
        ts_epoch_ms: Utc::now().timestamp_millis(),
        request_id,
        method,
        path,
        query,
        status: response.status().as_u16(),
        injected_delay_ms: delay_cell.load(),
        elapsed_ms,
        flake_seed: cfg.seed,
        delay_min_ms: cfg.min_ms,
        delay_max_ms: cfg.max_ms,
        delay_prob: cfg.prob,
    };
    if let Err(err) = state.request_log.append(&record).await {
        warn!(%err, "failed to append request-log record");
    }

    response
}

//! Request-log record schema.
//!
//! One record per HTTP request handled by the mock service, appended in
//! completion order. The active delay configuration rides along on every
//! record so a log file is self-describing about the chaos regime that
//! produced it.

use serde::{Deserialize, Serialize};

/// One immutable request-log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLogRecord {
    /// Completion timestamp, epoch milliseconds.
    pub ts_epoch_ms: i64,
    /// Request id: echoed from the `x-request-id` header, else generated.
    pub request_id: String,
    pub method: String,
    pub path: String,
    /// Raw query string, empty when absent.
    pub query: String,
    /// Final response status, including a synthetic 500 on handler panic.
    pub status: u16,
    /// Artificial latency injected into this request, milliseconds.
    pub injected_delay_ms: u64,
    /// Wall time from arrival to completion, milliseconds.
    pub elapsed_ms: f64,
    // Provenance: the delay configuration active for this process.
    pub flake_seed: u64,
    pub delay_min_ms: i64,
    pub delay_max_ms: i64,
    pub delay_prob: f64,
}

//! Diagnostic trace capture for one driver context.
//!
//! Recording starts when the context is created and stops when the trial
//! ends; the resulting [`Trace`] is persisted only when the trial failed and
//! discarded otherwise. Capture is cheap (in-memory events), persistence is
//! the part worth gating.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

use crate::error::Result;

/// One recorded event, offset in milliseconds from trace start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Offset from trace start, milliseconds.
    pub at_ms: f64,
    #[serde(flatten)]
    pub kind: TraceEventKind,
}

/// What happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceEventKind {
    /// The flow entered a named step.
    Step { name: String },
    /// A page navigation completed.
    Navigation { url: String, status: u16 },
    /// A backend request completed (or failed without a status).
    Request {
        method: String,
        url: String,
        status: Option<u16>,
        elapsed_ms: f64,
    },
    /// Overlay lifecycle: armed, detached, or waited out.
    Overlay { action: String, duration_ms: u64 },
    /// A fault surfaced through the driver.
    Fault { message: String },
}

/// A completed trace: the failure evidence bundle for one trial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    /// Wall-clock start of the trace, epoch milliseconds.
    pub started_ts_epoch_ms: i64,
    pub events: Vec<TraceEvent>,
}

impl Trace {
    /// Writes the trace as pretty JSON, creating parent directories.
    pub fn persist(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// In-memory event recorder for a live driver context.
#[derive(Debug)]
pub struct TraceRecorder {
    origin: Instant,
    started_ts_epoch_ms: i64,
    events: Vec<TraceEvent>,
}

impl TraceRecorder {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
            started_ts_epoch_ms: Utc::now().timestamp_millis(),
            events: Vec::new(),
        }
    }

    pub fn record(&mut self, kind: TraceEventKind) {
        let at_ms = self.origin.elapsed().as_secs_f64() * 1000.0;
        self.events.push(TraceEvent { at_ms, kind });
    }

    pub fn record_step(&mut self, name: &str) {
        self.record(TraceEventKind::Step {
            name: name.to_string(),
        });
    }

    /// Stops recording and yields the trace.
    pub fn stop(self) -> Trace {
        Trace {
            started_ts_epoch_ms: self.started_ts_epoch_ms,
            events: self.events,
        }
    }
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self::start()
    }
}

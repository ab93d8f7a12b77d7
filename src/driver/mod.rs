//! Browser-driver seam for the scripted UI flow.
//!
//! The trial runner never talks to a concrete automation stack; it drives
//! the [`UiDriver`] trait — navigation, element waits, clicks, overlay
//! control, and trace capture. The shipped implementation is
//! [`HttpFlowDriver`], which executes the flow over plain HTTP against the
//! mock service while modelling page state, element visibility gated on
//! backend fetches, bounded waits, and overlay pointer-interception.
//! Swapping in a real WebDriver-backed implementation means implementing
//! this trait and adapting the classifier's message substrings to that
//! driver's vocabulary; the trait and the fault kinds are the portable
//! contract.

pub mod http;
pub mod trace;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use http::HttpFlowDriver;
pub use trace::{Trace, TraceEvent, TraceEventKind, TraceRecorder};

/// Result type for driver operations.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Faults a driver can raise while executing the flow.
///
/// These are the *expected* trial faults: caught per trial, classified, and
/// recorded — never propagated as process errors. The variant is the
/// declared kind the classifier matches first; the message carries the
/// driver's diagnostic text for the substring rules.
#[derive(Error, Debug, Clone)]
pub enum DriverError {
    /// An operation exceeded its deadline.
    #[error("Timeout {timeout_ms}ms exceeded: {message}")]
    Timeout {
        /// Deadline that was exceeded, milliseconds.
        timeout_ms: u64,
        /// What was being waited on.
        message: String,
    },

    /// A postcondition check on page content failed.
    #[error("assertion failed: {message}")]
    Assertion { message: String },

    /// A locator resolved to more than one element when exactly one was
    /// required.
    #[error("strict mode violation: {message}")]
    StrictMode { message: String },

    /// The target element exists but is not visible.
    #[error("element is not visible: {selector}")]
    NotVisible { selector: String },

    /// The target element exists but is not enabled.
    #[error("element is not enabled: {selector}")]
    NotEnabled { selector: String },

    /// Another element received the pointer event.
    #[error("click intercepted: {message}")]
    ClickIntercepted { message: String },

    /// Low-level connection failure.
    #[error("network error: {message}")]
    Network { message: String },

    /// Anything else.
    #[error("{message}")]
    Other { message: String },
}

impl From<reqwest::Error> for DriverError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest's own text for refused connections says "error trying to
        // connect"; spell out the condition the classifier keys on.
        let message = if err.is_connect() {
            format!("connection refused: {err}")
        } else if err.is_timeout() {
            return DriverError::Timeout {
                timeout_ms: 0,
                message: format!("request timed out: {err}"),
            };
        } else {
            err.to_string()
        };
        DriverError::Network { message }
    }
}

/// Primitives the trial runner needs from a browser-automation stack.
///
/// One instance is one isolated context: fresh per trial, trace recording
/// started at construction, torn down with the trial.
#[async_trait]
pub trait UiDriver: Send {
    /// Navigates to a page and waits for its document to load.
    async fn navigate(&mut self, url: &str) -> DriverResult<()>;

    /// Waits for the first element matching `selector` to become visible.
    async fn wait_visible(&mut self, selector: &str, timeout: Duration) -> DriverResult<()>;

    /// Clicks the first element matching `selector`.
    ///
    /// The click must complete within `timeout`, including any time spent
    /// blocked behind an intercepting overlay.
    async fn click(&mut self, selector: &str, timeout: Duration) -> DriverResult<()>;

    /// Waits until the element's text content contains `needle`.
    async fn wait_text_contains(
        &mut self,
        selector: &str,
        needle: &str,
        timeout: Duration,
    ) -> DriverResult<()>;

    /// Installs the transient UI-blocking overlay with the given lifetime.
    async fn inject_overlay(&mut self, duration: Duration) -> DriverResult<()>;

    /// Waits for an armed overlay to detach.
    async fn wait_overlay_gone(&mut self, timeout: Duration) -> DriverResult<()>;

    /// Records a named flow step into the trace.
    fn record_step(&mut self, name: &str);

    /// Stops trace capture and yields everything recorded so far.
    fn stop_trace(&mut self) -> Trace;
}

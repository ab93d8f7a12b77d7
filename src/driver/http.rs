//! HTTP-level implementation of the flow driver.
//!
//! Executes the scripted approve flow by issuing the same requests the real
//! page would, with a small page-state model on top: elements become visible
//! once the backing API fetch completes, so injected backend latency shows
//! up as slow element waits, and an armed overlay steals pointer events from
//! clicks until its removal timer fires. All waits are bounded by the
//! caller-supplied timeout.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;
use url::Url;

use super::trace::{Trace, TraceEventKind, TraceRecorder};
use super::{DriverError, DriverResult, UiDriver};

/// Selectors the approve flow uses. Anything else is a driver bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    ListLinks,
    ApproveButton,
    StatusText,
}

fn resolve(selector: &str) -> DriverResult<Target> {
    match selector {
        "#list a" => Ok(Target::ListLinks),
        "button#approve" | "#approve" => Ok(Target::ApproveButton),
        "#status" => Ok(Target::StatusText),
        other => Err(DriverError::Other {
            message: format!("unsupported selector \"{other}\""),
        }),
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ItemRef {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct ItemsPayload {
    items: Vec<ItemRef>,
}

/// Outcome of the in-flight approve request, as the page would render it
/// into the `#status` element.
#[derive(Debug)]
struct ApproveOutcome {
    status_text: String,
    http_status: u16,
    elapsed_ms: f64,
}

#[derive(Debug)]
enum PageState {
    Blank,
    Index { items: Option<Vec<ItemRef>> },
    Detail { id: u64, loaded: bool },
}

/// One isolated flow context against a live base URL.
///
/// Fresh per trial; trace recording starts at construction.
pub struct HttpFlowDriver {
    base_url: Url,
    client: reqwest::Client,
    strict_locators: bool,
    page: PageState,
    overlay_until: Option<Instant>,
    overlay_duration_ms: u64,
    pending_approve: Option<JoinHandle<DriverResult<ApproveOutcome>>>,
    trace: TraceRecorder,
}

impl HttpFlowDriver {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
            strict_locators: false,
            page: PageState::Blank,
            overlay_until: None,
            overlay_duration_ms: 0,
            pending_approve: None,
            trace: TraceRecorder::start(),
        }
    }

    /// Strict locator resolution: a selector matching more than one element
    /// raises a strict-mode violation instead of taking the first match.
    pub fn with_strict_locators(mut self, strict: bool) -> Self {
        self.strict_locators = strict;
        self
    }

    fn api_url(&self, path: &str) -> DriverResult<Url> {
        self.base_url.join(path).map_err(|e| DriverError::Other {
            message: format!("invalid url path '{path}': {e}"),
        })
    }

    /// Fetches the item list the index page renders its links from.
    async fn fetch_items(&mut self) -> DriverResult<Vec<ItemRef>> {
        let url = self.api_url("/api/items")?;
        let started = Instant::now();
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status().as_u16();
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.trace.record(TraceEventKind::Request {
            method: "GET".into(),
            url: url.to_string(),
            status: Some(status),
            elapsed_ms,
        });
        if status != 200 {
            return Err(DriverError::Other {
                message: format!("GET /api/items returned status {status}"),
            });
        }
        let payload: ItemsPayload = response.json().await?;
        Ok(payload.items)
    }

    /// Fetches the item detail the detail page renders its button from.
    async fn fetch_detail(&mut self, id: u64) -> DriverResult<u16> {
        let url = self.api_url(&format!("/api/items/{id}"))?;
        let started = Instant::now();
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status().as_u16();
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.trace.record(TraceEventKind::Request {
            method: "GET".into(),
            url: url.to_string(),
            status: Some(status),
            elapsed_ms,
        });
        Ok(status)
    }

    /// Burns the rest of the deadline, then raises the timeout fault.
    async fn timed_out(&mut self, deadline: Instant, timeout: Duration, message: String) -> DriverError {
        tokio::time::sleep_until(deadline).await;
        let err = DriverError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
            message,
        };
        self.trace.record(TraceEventKind::Fault {
            message: err.to_string(),
        });
        err
    }

    /// Blocks a click behind an active overlay.
    ///
    /// Returns the timeout fault when the overlay outlives the deadline;
    /// otherwise waits for the overlay's removal timer and lets the click
    /// proceed.
    async fn contend_with_overlay(
        &mut self,
        selector: &str,
        deadline: Instant,
        timeout: Duration,
    ) -> DriverResult<()> {
        let Some(until) = self.overlay_until else {
            return Ok(());
        };
        if until <= Instant::now() {
            self.clear_overlay();
            return Ok(());
        }
        if until > deadline {
            let message = format!(
                "click action on \"{selector}\" did not complete: \
                 <div id=\"flake-overlay\"> intercepts pointer events"
            );
            return Err(self.timed_out(deadline, timeout, message).await);
        }
        tokio::time::sleep_until(until).await;
        self.clear_overlay();
        Ok(())
    }

    fn clear_overlay(&mut self) {
        if self.overlay_until.take().is_some() {
            self.trace.record(TraceEventKind::Overlay {
                action: "detached".into(),
                duration_ms: self.overlay_duration_ms,
            });
        }
    }
}

#[async_trait]
impl UiDriver for HttpFlowDriver {
    async fn navigate(&mut self, url: &str) -> DriverResult<()> {
        let parsed = Url::parse(url).map_err(|e| DriverError::Other {
            message: format!("invalid url '{url}': {e}"),
        })?;
        let response = self.client.get(parsed.clone()).send().await?;
        let status = response.status().as_u16();
        self.trace.record(TraceEventKind::Navigation {
            url: url.to_string(),
            status,
        });
        if status != 200 {
            return Err(DriverError::Other {
                message: format!("navigation to {url} failed with status {status}"),
            });
        }

        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();
        self.page = match segments.as_slice() {
            [] => PageState::Index { items: None },
            ["items", id] => {
                let id = id.parse().map_err(|_| DriverError::Other {
                    message: format!("invalid item id in url '{url}'"),
                })?;
                PageState::Detail { id, loaded: false }
            }
            _ => PageState::Blank,
        };
        trace!(url, "navigated");
        Ok(())
    }

    async fn wait_visible(&mut self, selector: &str, timeout: Duration) -> DriverResult<()> {
        let deadline = Instant::now() + timeout;
        match resolve(selector)? {
            Target::ListLinks => {
                let items_missing = matches!(self.page, PageState::Index { items: None });
                if items_missing {
                    let fetched = tokio::time::timeout_at(deadline, self.fetch_items()).await;
                    match fetched {
                        Ok(items) => {
                            let items = items?;
                            self.page = PageState::Index { items: Some(items) };
                        }
                        Err(_) => {
                            let message = format!(
                                "waiting for selector \"{selector}\" to be visible"
                            );
                            return Err(self.timed_out(deadline, timeout, message).await);
                        }
                    }
                }
                // Resolve the view first so the page borrow is released
                // before any deadline sleep.
                let matched = match &self.page {
                    PageState::Index { items: Some(items) } => Some(items.len()),
                    PageState::Index { items: None } => Some(0),
                    _ => None,
                };
                match matched {
                    Some(n) if n > 0 => {
                        if self.strict_locators && n > 1 {
                            return Err(DriverError::StrictMode {
                                message: format!(
                                    "locator \"{selector}\" resolved to {n} elements"
                                ),
                            });
                        }
                        Ok(())
                    }
                    Some(_) => {
                        let message =
                            format!("waiting for selector \"{selector}\" to be visible");
                        Err(self.timed_out(deadline, timeout, message).await)
                    }
                    None => Err(DriverError::NotVisible {
                        selector: selector.to_string(),
                    }),
                }
            }
            Target::ApproveButton => {
                let pending_detail = match &self.page {
                    PageState::Detail { id, loaded: false } => Some(*id),
                    PageState::Detail { loaded: true, .. } => None,
                    _ => {
                        return Err(DriverError::NotVisible {
                            selector: selector.to_string(),
                        })
                    }
                };
                if let Some(id) = pending_detail {
                    let fetched = tokio::time::timeout_at(deadline, self.fetch_detail(id)).await;
                    match fetched {
                        Ok(status) => {
                            if status? != 200 {
                                // Detail fetch failed; the page renders an
                                // error banner and the button never appears.
                                let message = format!(
                                    "waiting for selector \"{selector}\" to be visible"
                                );
                                return Err(self.timed_out(deadline, timeout, message).await);
                            }
                            self.page = PageState::Detail { id, loaded: true };
                        }
                        Err(_) => {
                            let message =
                                format!("waiting for selector \"{selector}\" to be visible");
                            return Err(self.timed_out(deadline, timeout, message).await);
                        }
                    }
                }
                Ok(())
            }
            Target::StatusText => match self.page {
                PageState::Detail { loaded: true, .. } => Ok(()),
                _ => Err(DriverError::NotVisible {
                    selector: selector.to_string(),
                }),
            },
        }
    }

    async fn click(&mut self, selector: &str, timeout: Duration) -> DriverResult<()> {
        let deadline = Instant::now() + timeout;
        let target = resolve(selector)?;
        self.contend_with_overlay(selector, deadline, timeout).await?;

        match target {
            Target::ListLinks => {
                let first_id = match &self.page {
                    PageState::Index { items: Some(items) } if !items.is_empty() => items[0].id,
                    _ => {
                        return Err(DriverError::NotVisible {
                            selector: selector.to_string(),
                        })
                    }
                };
                // Link click navigates to the detail page document; the
                // detail data fetch happens on the next wait.
                let url = self.api_url(&format!("/items/{first_id}"))?;
                let response = self.client.get(url.clone()).send().await?;
                let status = response.status().as_u16();
                self.trace.record(TraceEventKind::Navigation {
                    url: url.to_string(),
                    status,
                });
                if status != 200 {
                    return Err(DriverError::Other {
                        message: format!("navigation to {url} failed with status {status}"),
                    });
                }
                self.page = PageState::Detail {
                    id: first_id,
                    loaded: false,
                };
                Ok(())
            }
            Target::ApproveButton => {
                let id = match &self.page {
                    PageState::Detail { id, loaded: true } => *id,
                    _ => {
                        return Err(DriverError::NotVisible {
                            selector: selector.to_string(),
                        })
                    }
                };
                if self.pending_approve.is_some() {
                    return Err(DriverError::NotEnabled {
                        selector: selector.to_string(),
                    });
                }
                let url = self.api_url(&format!("/api/items/{id}/approve"))?;
                let client = self.client.clone();
                self.pending_approve = Some(tokio::spawn(async move {
                    let started = Instant::now();
                    let response = client.post(url).send().await?;
                    let http_status = response.status().as_u16();
                    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                    let status_text = if http_status == 200 {
                        "Approved".to_string()
                    } else {
                        format!("Error: approve failed with status {http_status}")
                    };
                    Ok(ApproveOutcome {
                        status_text,
                        http_status,
                        elapsed_ms,
                    })
                }));
                Ok(())
            }
            Target::StatusText => Err(DriverError::Other {
                message: format!("element \"{selector}\" is not clickable"),
            }),
        }
    }

    async fn wait_text_contains(
        &mut self,
        selector: &str,
        needle: &str,
        timeout: Duration,
    ) -> DriverResult<()> {
        let deadline = Instant::now() + timeout;
        if resolve(selector)? != Target::StatusText {
            return Err(DriverError::Other {
                message: format!("text wait on unsupported selector \"{selector}\""),
            });
        }
        if !matches!(self.page, PageState::Detail { loaded: true, .. }) {
            return Err(DriverError::NotVisible {
                selector: selector.to_string(),
            });
        }

        let Some(handle) = self.pending_approve.take() else {
            // Nothing will ever update the status text.
            let message =
                format!("waiting for selector \"{selector}\" to contain \"{needle}\"");
            return Err(self.timed_out(deadline, timeout, message).await);
        };

        match tokio::time::timeout_at(deadline, handle).await {
            Err(_) => {
                // The request keeps running server-side; the wait gives up.
                let message =
                    format!("waiting for selector \"{selector}\" to contain \"{needle}\"");
                Err(self.timed_out(deadline, timeout, message).await)
            }
            Ok(Err(join_err)) => Err(DriverError::Other {
                message: format!("approve task failed: {join_err}"),
            }),
            Ok(Ok(Err(driver_err))) => {
                self.trace.record(TraceEventKind::Fault {
                    message: driver_err.to_string(),
                });
                Err(driver_err)
            }
            Ok(Ok(Ok(outcome))) => {
                self.trace.record(TraceEventKind::Request {
                    method: "POST".into(),
                    url: "/api/items/{id}/approve".into(),
                    status: Some(outcome.http_status),
                    elapsed_ms: outcome.elapsed_ms,
                });
                if outcome.status_text.contains(needle) {
                    Ok(())
                } else {
                    let err = DriverError::Assertion {
                        message: format!(
                            "expected \"{selector}\" to contain \"{needle}\", got \"{}\"",
                            outcome.status_text
                        ),
                    };
                    self.trace.record(TraceEventKind::Fault {
                        message: err.to_string(),
                    });
                    Err(err)
                }
            }
        }
    }

    async fn inject_overlay(&mut self, duration: Duration) -> DriverResult<()> {
        self.overlay_duration_ms = duration.as_millis() as u64;
        self.overlay_until = Some(Instant::now() + duration);
        self.trace.record(TraceEventKind::Overlay {
            action: "armed".into(),
            duration_ms: self.overlay_duration_ms,
        });
        Ok(())
    }

    async fn wait_overlay_gone(&mut self, timeout: Duration) -> DriverResult<()> {
        let deadline = Instant::now() + timeout;
        let Some(until) = self.overlay_until else {
            return Ok(());
        };
        if until > deadline {
            let message = "waiting for overlay to detach".to_string();
            return Err(self.timed_out(deadline, timeout, message).await);
        }
        if until > Instant::now() {
            tokio::time::sleep_until(until).await;
        }
        self.clear_overlay();
        Ok(())
    }

    fn record_step(&mut self, name: &str) {
        self.trace.record_step(name);
    }

    fn stop_trace(&mut self) -> Trace {
        std::mem::take(&mut self.trace).stop()
    }
}

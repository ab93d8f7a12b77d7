//! The trial runner: N sequential attempts of the scripted approve flow.
//!
//! Each trial owns a fresh driver context with trace capture started at
//! trial begin. Faults raised while driving the flow are caught, classified
//! against the taxonomy, and recorded; they never abort the run. The trace
//! artifact is persisted only when the trial failed — success evidence is
//! not worth the storage.
//!
//! Trials execute strictly sequentially: the goal is cleanly attributable
//! failure evidence, not throughput.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};
use url::Url;

use crate::classify::classify;
use crate::driver::{DriverResult, HttpFlowDriver, UiDriver};
use crate::error::{Error, Result};
use crate::jsonl::JsonlWriter;
use crate::overlay::{FlakeStrategy, OverlayInjector};
use crate::settings::Settings;

/// Trial-log filename under the artifacts directory.
pub const TRIAL_LOG_FILENAME: &str = "trial_runs.jsonl";

/// Trace directory name under the artifacts directory.
pub const TRACES_DIRNAME: &str = "traces";

/// Longest error message stored in a trial record.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Steps of the approve flow, in order. On failure the current step name is
/// recorded as the failure step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStep {
    Start,
    Navigate,
    LocateLink,
    ClickLink,
    LocateButton,
    ArmOverlay,
    ClickButton,
    WaitStatus,
    Done,
}

impl FlowStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Navigate => "navigate",
            Self::LocateLink => "locate_link",
            Self::ClickLink => "click_link",
            Self::LocateButton => "locate_button",
            Self::ArmOverlay => "arm_overlay",
            Self::ClickButton => "click_button",
            Self::WaitStatus => "wait_status",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for FlowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable entry per trial, appended in execution order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
    /// 1-based, monotonic run id.
    pub run_id: u32,
    pub ok: bool,
    /// Classified failure category; empty string when ok.
    pub error_type: String,
    /// Driver message, truncated to cap log size; empty string when ok.
    pub error_message: String,
    pub elapsed_ms: f64,
    pub base_url: String,
    pub ts_epoch_ms: i64,

    // Present only when an overlay-fault strategy is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_fired: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_prob: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_seed: Option<u64>,
}

/// Flow timeouts. The naive click timeout is deliberately short; that is
/// the regime under study.
#[derive(Debug, Clone, Copy)]
pub struct RunnerOptions {
    /// Element waits and ordinary clicks.
    pub step_timeout: Duration,
    /// The final status-text wait.
    pub status_timeout: Duration,
    /// Click timeout under the naive strategy.
    pub naive_click_timeout: Duration,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_millis(5_000),
            status_timeout: Duration::from_millis(10_000),
            naive_click_timeout: Duration::from_millis(500),
        }
    }
}

/// Factory producing one fresh driver context per trial.
pub type DriverFactory = Box<dyn Fn(&Url) -> Box<dyn UiDriver + Send> + Send + Sync>;

/// Orchestrates the trials against one live base URL.
pub struct TrialRunner {
    base_url: Url,
    base_url_str: String,
    runs: u32,
    artifacts_dir: PathBuf,
    overlay: OverlayInjector,
    trial_log: JsonlWriter,
    opts: RunnerOptions,
    make_driver: DriverFactory,
    http: reqwest::Client,
}

impl TrialRunner {
    /// Builds a runner from settings; validates the base URL and the
    /// overlay configuration up front.
    pub fn new(settings: &Settings, artifacts_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_url = Url::parse(&settings.base_url).map_err(|e| {
            Error::Config(format!("invalid BASE_URL '{}': {e}", settings.base_url))
        })?;
        let overlay = OverlayInjector::new(settings.strategy, settings.overlay_config())?;
        let artifacts_dir = artifacts_dir.into();
        let trial_log = JsonlWriter::new(artifacts_dir.join(TRIAL_LOG_FILENAME));

        Ok(Self {
            base_url,
            base_url_str: settings.base_url.clone(),
            runs: settings.runs,
            artifacts_dir,
            overlay,
            trial_log,
            opts: RunnerOptions::default(),
            make_driver: Box::new(|url| Box::new(HttpFlowDriver::new(url.clone()))),
            http: reqwest::Client::new(),
        })
    }

    /// Overrides the flow timeouts.
    pub fn with_options(mut self, opts: RunnerOptions) -> Self {
        self.opts = opts;
        self
    }

    /// Swaps the driver implementation. The default drives the flow over
    /// HTTP; tests inject scripted drivers here.
    pub fn with_driver_factory(mut self, make_driver: DriverFactory) -> Self {
        self.make_driver = make_driver;
        self
    }

    pub fn runs(&self) -> u32 {
        self.runs
    }

    /// Pre-flight health check. Failure here is fatal to the whole run.
    pub async fn assert_server_up(&self) -> Result<()> {
        let url = self
            .base_url
            .join("/health")
            .map_err(|e| Error::Config(format!("invalid base url: {e}")))?;
        let response = self
            .http
            .get(url.clone())
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .map_err(|e| Error::health_check(url.as_str(), e.to_string()))?;
        if response.status() != 200 {
            return Err(Error::health_check(
                url.as_str(),
                format!("unexpected status {}", response.status().as_u16()),
            ));
        }
        Ok(())
    }

    /// Runs all trials, appending each record to the trial log as it
    /// completes. Trial faults are data; only infrastructure failures
    /// (artifact or log IO) surface as errors.
    #[instrument(skip(self), fields(runs = self.runs, base_url = %self.base_url_str))]
    pub async fn run(&mut self) -> Result<Vec<TrialRecord>> {
        info!(runs = self.runs, "starting trials");
        let mut records = Vec::with_capacity(self.runs as usize);
        for run_id in 1..=self.runs {
            let record = self.run_once(run_id).await?;
            self.trial_log.append(&record).await?;
            records.push(record);
        }
        info!("trials finished");
        Ok(records)
    }

    /// Drives the flow once without recording anything. Used by the smoke
    /// command.
    pub async fn smoke(&mut self) -> DriverResult<()> {
        let mut driver = (self.make_driver)(&self.base_url);
        let mut step = FlowStep::Start;
        let mut overlay_fired = false;
        driver.record_step(step.as_str());
        self.drive_flow(driver.as_mut(), &mut step, &mut overlay_fired)
            .await
    }

    async fn run_once(&mut self, run_id: u32) -> Result<TrialRecord> {
        let started = Instant::now();

        // Fresh context per trial; capture starts now because failures are
        // not anticipated in advance.
        let mut driver = (self.make_driver)(&self.base_url);
        let mut step = FlowStep::Start;
        let mut overlay_fired = false;
        driver.record_step(step.as_str());

        let outcome = self
            .drive_flow(driver.as_mut(), &mut step, &mut overlay_fired)
            .await;

        let elapsed_ms = (started.elapsed().as_secs_f64() * 1_000_000.0).round() / 1000.0;
        let (ok, error_type, error_message) = match &outcome {
            Ok(()) => (true, String::new(), String::new()),
            Err(err) => (
                false,
                classify(err).as_str().to_string(),
                truncate_message(&err.to_string(), MAX_ERROR_MESSAGE_LEN),
            ),
        };

        let trace = driver.stop_trace();
        if !ok {
            let trace_path = self
                .artifacts_dir
                .join(TRACES_DIRNAME)
                .join(format!("trace_run_{run_id:03}.json"));
            trace.persist(&trace_path)?;
            debug!(run_id, step = %step, error_type, "trial failed, trace persisted");
        }

        let overlay_active = self.overlay.strategy() != FlakeStrategy::Off;
        let cfg = *self.overlay.config();
        Ok(TrialRecord {
            run_id,
            ok,
            error_type,
            error_message,
            elapsed_ms,
            base_url: self.base_url_str.clone(),
            ts_epoch_ms: Utc::now().timestamp_millis(),
            failed_step: overlay_active.then(|| {
                if ok {
                    String::new()
                } else {
                    step.as_str().to_string()
                }
            }),
            overlay_fired: overlay_active.then_some(overlay_fired),
            overlay_ms: overlay_active.then_some(cfg.duration_ms),
            overlay_prob: overlay_active.then_some(cfg.prob),
            overlay_seed: overlay_active.then_some(cfg.seed),
        })
    }

    async fn drive_flow(
        &mut self,
        driver: &mut dyn UiDriver,
        step: &mut FlowStep,
        overlay_fired: &mut bool,
    ) -> DriverResult<()> {
        let step_timeout = self.opts.step_timeout;
        let status_timeout = self.opts.status_timeout;
        let naive_click_timeout = self.opts.naive_click_timeout;

        enter(driver, step, FlowStep::Navigate);
        let index_url = self
            .base_url
            .join("/")
            .map_err(|e| crate::driver::DriverError::Other {
                message: format!("invalid base url: {e}"),
            })?;
        driver.navigate(index_url.as_str()).await?;

        enter(driver, step, FlowStep::LocateLink);
        driver.wait_visible("#list a", step_timeout).await?;

        enter(driver, step, FlowStep::ClickLink);
        driver.click("#list a", step_timeout).await?;

        enter(driver, step, FlowStep::LocateButton);
        driver.wait_visible("button#approve", step_timeout).await?;

        if let Some(plan) = self.overlay.decide() {
            enter(driver, step, FlowStep::ArmOverlay);
            *overlay_fired = true;
            driver
                .inject_overlay(Duration::from_millis(plan.duration_ms))
                .await?;
        }

        enter(driver, step, FlowStep::ClickButton);
        match self.overlay.strategy() {
            FlakeStrategy::Naive => {
                driver.click("button#approve", naive_click_timeout).await?;
            }
            FlakeStrategy::Wait => {
                if *overlay_fired {
                    let wait_timeout =
                        Duration::from_millis(self.overlay.config().duration_ms) + step_timeout;
                    driver.wait_overlay_gone(wait_timeout).await?;
                }
                driver.click("button#approve", step_timeout).await?;
            }
            FlakeStrategy::Off => {
                driver.click("button#approve", step_timeout).await?;
            }
        }

        enter(driver, step, FlowStep::WaitStatus);
        driver
            .wait_text_contains("#status", "Approved", status_timeout)
            .await?;

        enter(driver, step, FlowStep::Done);
        Ok(())
    }
}

fn enter(driver: &mut dyn UiDriver, step: &mut FlowStep, next: FlowStep) {
    *step = next;
    driver.record_step(next.as_str());
}

/// Truncates on a char boundary so multi-byte driver messages stay valid.
fn truncate_message(message: &str, max_len: usize) -> String {
    if message.len() <= max_len {
        return message.to_string();
    }
    let mut end = max_len;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}

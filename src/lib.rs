//! # flakebench - a deterministic flake-injection bench
//!
//! flakebench reproduces and measures end-to-end test flakiness under
//! controlled fault injection. It does not try to fix flaky tests; it
//! exists to provoke them on demand and to provide ground truth for a
//! failure-classification scheme.
//!
//! Two sides, connected only over HTTP:
//!
//! ```text
//! server side (one mock-service process)
//! ┌────────────────────────────────────────────────┐
//! │  DelayInjector ──► API handlers ──► RequestLog │
//! │  (seeded RNG)      (axum)           (JSONL)    │
//! └────────────────────────────────────────────────┘
//!                        ▲  HTTP
//!                        │
//! client side (one trial-runner process)
//! ┌────────────────────────────────────────────────┐
//! │  OverlayInjector ──► UiDriver ──► TrialRunner  │
//! │                                       │        │
//! │              classify ◄── fault ──────┘        │
//! │                  │                             │
//! │                  ▼                             │
//! │          TrialRecord (JSONL) ──► Aggregate     │
//! └────────────────────────────────────────────────┘
//! ```
//!
//! Reproducibility: both injectors own explicitly constructed, seeded RNG
//! instances — never process-wide singletons — so tests can run
//! differently-seeded instances without cross-contamination. A caveat is
//! documented in [`flake`]: under concurrent request handling, the delay
//! RNG's draw sequence depends on call scheduling order, so a replayed seed
//! only reproduces identical results when the call ordering is identical
//! too.
//!
//! ## Quick example
//!
//! ```rust,ignore
//! use flakebench::settings::Settings;
//! use flakebench::report::AggregateReport;
//! use flakebench::trial::TrialRunner;
//!
//! #[tokio::main]
//! async fn main() -> flakebench::error::Result<()> {
//!     let settings = Settings::from_env()?;
//!     let mut runner = TrialRunner::new(&settings, "artifacts")?;
//!     runner.assert_server_up().await?;
//!     let records = runner.run().await?;
//!     AggregateReport::from_records(&records).print();
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

/// Error types and result aliases.
pub mod error;

/// Environment-driven configuration for both sides of the bench.
pub mod settings;

/// Seeded, lock-guarded latency injection (server side).
pub mod flake;

/// Seeded overlay-fault decisions (client side).
pub mod overlay;

/// Append-only JSON-Lines persistence shared by both log surfaces.
pub mod jsonl;

/// Failure taxonomy and the priority-ordered classifier.
pub mod classify;

/// The browser-driver seam: the [`driver::UiDriver`] trait, the HTTP-level
/// flow driver, and diagnostic trace capture.
pub mod driver;

/// The mock service: REST surface, HTML pages, latency injection, and the
/// request log.
pub mod server;

/// The trial runner: sequential scripted-flow attempts with per-trial
/// records and failure-only trace persistence.
pub mod trial;

/// Aggregate statistics and the CLI recap.
pub mod report;

/// Returns the current version of flakebench.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

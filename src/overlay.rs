//! Client-side overlay fault source.
//!
//! Where [`crate::flake`] injects latency into the backend, this module
//! injects contention into the UI: a transient, nearly-invisible element that
//! covers the viewport and steals pointer events until its auto-removal
//! timer fires. The injector only *decides*; the DOM mutation itself is
//! executed by the flow driver.
//!
//! The two active strategies are a deliberate two-regime demonstration:
//! `naive` clicks through the overlay window with an artificially short
//! timeout and produces realistic contention flakes, `wait` waits for the
//! overlay to detach first and eliminates them. The aggregate report's
//! category breakdown is the intended evidence of the difference.

use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Overlay-fault strategy for the trial runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlakeStrategy {
    /// No overlay injection.
    Off,
    /// Arm the overlay, then click with an artificially short timeout.
    Naive,
    /// Arm the overlay, then wait for its removal before clicking.
    Wait,
}

impl FlakeStrategy {
    /// Wire name, as used in `FLAKE_STRATEGY` and in trial records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Naive => "naive",
            Self::Wait => "wait",
        }
    }
}

impl std::fmt::Display for FlakeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlakeStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "naive" => Ok(Self::Naive),
            "wait" => Ok(Self::Wait),
            other => Err(format!(
                "unknown strategy '{other}' (expected off|naive|wait)"
            )),
        }
    }
}

/// Overlay-fault parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// RNG seed for the per-trial draw.
    pub seed: u64,
    /// How long an armed overlay blocks the viewport, milliseconds.
    pub duration_ms: u64,
    /// Probability that a trial arms the overlay, in `[0.0, 1.0]`.
    pub prob: f64,
}

/// Decision for one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayPlan {
    /// Overlay lifetime before auto-removal.
    pub duration_ms: u64,
}

/// Seeded per-trial overlay decision source.
///
/// Owned by the trial runner; trials are strictly sequential, so the RNG
/// needs no lock. One draw is consumed per [`OverlayInjector::decide`] call
/// when a strategy is active; `off` consumes nothing, keeping the draw
/// stream comparable across `naive` and `wait` runs with the same seed.
#[derive(Debug)]
pub struct OverlayInjector {
    strategy: FlakeStrategy,
    cfg: OverlayConfig,
    rng: StdRng,
}

impl OverlayInjector {
    /// Builds the injector, validating the configuration once.
    pub fn new(strategy: FlakeStrategy, cfg: OverlayConfig) -> Result<Self> {
        if !(0.0..=1.0).contains(&cfg.prob) {
            return Err(Error::invalid_config(
                "FLAKE_OVERLAY_PROB",
                "must be within [0.0, 1.0]",
            ));
        }
        Ok(Self {
            strategy,
            cfg,
            rng: StdRng::seed_from_u64(cfg.seed),
        })
    }

    pub fn strategy(&self) -> FlakeStrategy {
        self.strategy
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.cfg
    }

    /// Draws once and decides whether this trial arms the overlay.
    ///
    /// Returns `None` without drawing when the strategy is `off`.
    pub fn decide(&mut self) -> Option<OverlayPlan> {
        if self.strategy == FlakeStrategy::Off {
            return None;
        }
        let roll: f64 = self.rng.gen();
        if roll >= self.cfg.prob {
            return None;
        }
        Some(OverlayPlan {
            duration_ms: self.cfg.duration_ms,
        })
    }
}

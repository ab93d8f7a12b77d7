//! Environment-driven configuration.
//!
//! Every knob of the bench is an environment variable with a default; empty
//! values count as unset. Malformed values are configuration errors raised
//! at load time — range validation (delay bounds, probabilities) happens
//! once, at injector construction, and never at request time.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::flake::DelayConfig;
use crate::overlay::{FlakeStrategy, OverlayConfig};

/// Default bind/base host:port of the mock service.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8004";

/// Default request-log filename under the artifacts directory.
pub const DEFAULT_REQUEST_LOG: &str = "backend_latency_samples.jsonl";

/// Resolved configuration for both sides of the bench.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    // Server-side latency injection
    pub flake_seed: u64,
    pub delay_min_ms: i64,
    pub delay_max_ms: i64,
    pub delay_prob: f64,

    /// Request-log filename (relative to the artifacts directory).
    pub log_filename: String,

    /// Overlay duration injected into the served pages, milliseconds.
    pub ui_overlay_ms: u64,

    // Client-side overlay fault
    pub strategy: FlakeStrategy,
    pub overlay_ms: u64,
    pub overlay_prob: f64,
    pub overlay_seed: u64,

    // Trial runner
    pub base_url: String,
    pub runs: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            flake_seed: 42,
            delay_min_ms: 0,
            delay_max_ms: 1200,
            delay_prob: 1.0,
            log_filename: DEFAULT_REQUEST_LOG.to_string(),
            ui_overlay_ms: 0,
            strategy: FlakeStrategy::Off,
            overlay_ms: 300,
            overlay_prob: 0.0,
            overlay_seed: 42,
            base_url: DEFAULT_BASE_URL.to_string(),
            runs: 50,
        }
    }
}

impl Settings {
    /// Loads settings from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            flake_seed: env_parse("FLAKE_SEED", defaults.flake_seed)?,
            delay_min_ms: env_parse("DELAY_MIN_MS", defaults.delay_min_ms)?,
            delay_max_ms: env_parse("DELAY_MAX_MS", defaults.delay_max_ms)?,
            delay_prob: env_parse("DELAY_PROB", defaults.delay_prob)?,
            log_filename: env_string("BACKEND_JSONL_LOG", &defaults.log_filename),
            ui_overlay_ms: env_parse("UI_OVERLAY_MS", defaults.ui_overlay_ms)?,
            strategy: env_parse("FLAKE_STRATEGY", defaults.strategy)?,
            overlay_ms: env_parse("FLAKE_OVERLAY_MS", defaults.overlay_ms)?,
            overlay_prob: env_parse("FLAKE_OVERLAY_PROB", defaults.overlay_prob)?,
            overlay_seed: env_parse("TEST_FLAKE_SEED", defaults.overlay_seed)?,
            base_url: env_string("BASE_URL", &defaults.base_url),
            runs: env_parse("FLAKE_RUNS", defaults.runs)?,
        })
    }

    /// Latency-injection parameters for the mock service.
    pub fn delay_config(&self) -> DelayConfig {
        DelayConfig {
            seed: self.flake_seed,
            min_ms: self.delay_min_ms,
            max_ms: self.delay_max_ms,
            prob: self.delay_prob,
        }
    }

    /// Overlay-fault parameters for the trial runner.
    pub fn overlay_config(&self) -> OverlayConfig {
        OverlayConfig {
            seed: self.overlay_seed,
            duration_ms: self.overlay_ms,
            prob: self.overlay_prob,
        }
    }
}

fn env_string(name: &str, default: &str) -> String {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => value
            .parse()
            .map_err(|e: T::Err| Error::invalid_config(name, e.to_string())),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    fn clear_env() {
        for name in [
            "FLAKE_SEED",
            "DELAY_MIN_MS",
            "DELAY_MAX_MS",
            "DELAY_PROB",
            "BACKEND_JSONL_LOG",
            "UI_OVERLAY_MS",
            "FLAKE_STRATEGY",
            "FLAKE_OVERLAY_MS",
            "FLAKE_OVERLAY_PROB",
            "TEST_FLAKE_SEED",
            "BASE_URL",
            "FLAKE_RUNS",
        ] {
            std::env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn defaults_without_environment() {
        clear_env();
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.flake_seed, 42);
        assert_eq!(settings.delay_max_ms, 1200);
        assert_eq!(settings.runs, 50);
        assert_eq!(settings.strategy, FlakeStrategy::Off);
    }

    #[test]
    #[serial]
    fn environment_overrides_defaults() {
        clear_env();
        std::env::set_var("FLAKE_SEED", "7");
        std::env::set_var("DELAY_PROB", "0.25");
        std::env::set_var("FLAKE_STRATEGY", "naive");
        std::env::set_var("FLAKE_RUNS", "10");
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.flake_seed, 7);
        assert_eq!(settings.delay_prob, 0.25);
        assert_eq!(settings.strategy, FlakeStrategy::Naive);
        assert_eq!(settings.runs, 10);
        clear_env();
    }

    #[test]
    #[serial]
    fn empty_values_mean_unset() {
        clear_env();
        std::env::set_var("FLAKE_SEED", "");
        std::env::set_var("BASE_URL", "");
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.flake_seed, 42);
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        clear_env();
    }

    #[test]
    #[serial]
    fn malformed_values_fail_fast() {
        clear_env();
        std::env::set_var("DELAY_MIN_MS", "soon");
        let err = Settings::from_env().unwrap_err();
        assert!(err.to_string().contains("DELAY_MIN_MS"));
        clear_env();

        std::env::set_var("FLAKE_STRATEGY", "always");
        let err = Settings::from_env().unwrap_err();
        assert!(err.to_string().contains("FLAKE_STRATEGY"));
        clear_env();
    }

    #[test]
    #[serial]
    fn delay_config_carries_the_injection_fields() {
        clear_env();
        std::env::set_var("DELAY_MIN_MS", "-1");
        // Negative values parse here; range validation belongs to the
        // injector, which must reject them at construction.
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.delay_config().min_ms, -1);
        assert!(crate::flake::DelayInjector::new(settings.delay_config()).is_err());
        clear_env();
    }
}

//! Seeded latency injection for the mock service.
//!
//! The [`DelayInjector`] is the single source of artificial backend latency.
//! It owns one seeded RNG behind a mutex so that concurrent request handlers
//! observe a serialized, gap-free draw sequence, while the injected sleeps
//! themselves run in parallel outside the lock.
//!
//! Reproducibility contract: for a fixed seed and a single-threaded caller,
//! the sequence of [`DelayInjector::pick_delay_ms`] results is identical
//! across runs. Each call consumes one gate draw, and one uniform draw only
//! when the gate passes — so under concurrent callers the draw sequence
//! depends on call scheduling order. That is a documented limitation of the
//! replay story, not something this module tries to hide.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Immutable latency-injection parameters.
///
/// Carried verbatim into every request-log record for provenance, so a log
/// file is self-describing about the chaos regime that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayConfig {
    /// RNG seed.
    pub seed: u64,
    /// Lower bound of the injected delay, milliseconds.
    pub min_ms: i64,
    /// Upper bound of the injected delay, milliseconds.
    pub max_ms: i64,
    /// Probability that injection fires on a given call, in `[0.0, 1.0]`.
    pub prob: f64,
}

/// Random delay injector with reproducibility (seeded RNG).
///
/// Thread-safe RNG access: the lock wraps the draws only, never the sleep,
/// so concurrent requests sleep in parallel while RNG consumption stays
/// serialized.
pub struct DelayInjector {
    cfg: DelayConfig,
    rng: Mutex<StdRng>,
}

impl DelayInjector {
    /// Builds an injector, validating the configuration once.
    ///
    /// Invalid values fail construction with a configuration error; they are
    /// never clamped and can no longer fail at request time.
    pub fn new(cfg: DelayConfig) -> Result<Self> {
        if cfg.min_ms < 0 || cfg.max_ms < 0 {
            return Err(Error::InvalidDelayConfig(
                "min_ms/max_ms must be >= 0".to_string(),
            ));
        }
        if cfg.min_ms > cfg.max_ms {
            return Err(Error::InvalidDelayConfig(
                "min_ms must be <= max_ms".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&cfg.prob) {
            return Err(Error::InvalidDelayConfig(
                "prob must be within [0.0, 1.0]".to_string(),
            ));
        }

        Ok(Self {
            cfg,
            rng: Mutex::new(StdRng::seed_from_u64(cfg.seed)),
        })
    }

    /// The validated configuration this injector was built from.
    pub fn config(&self) -> &DelayConfig {
        &self.cfg
    }

    /// Picks the next delay.
    ///
    /// Returns 0 when the probability gate fails, otherwise a uniform integer
    /// in `[min_ms, max_ms]` inclusive. The gate draw happens on every call;
    /// the uniform draw is consumed only when the gate passes.
    pub fn pick_delay_ms(&self) -> u64 {
        let mut rng = self.rng.lock();
        let roll: f64 = rng.gen();
        if roll >= self.cfg.prob {
            return 0;
        }
        rng.gen_range(self.cfg.min_ms as u64..=self.cfg.max_ms as u64)
    }

    /// Picks a delay and, if nonzero, suspends the caller for that long.
    ///
    /// The sleep runs outside the RNG lock.
    pub async fn inject(&self) -> u64 {
        let delay_ms = self.pick_delay_ms();
        if delay_ms > 0 {
            debug!(delay_ms, "injecting artificial latency");
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
        }
        delay_ms
    }
}

impl std::fmt::Debug for DelayInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayInjector")
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cfg(seed: u64, min_ms: i64, max_ms: i64, prob: f64) -> DelayConfig {
        DelayConfig {
            seed,
            min_ms,
            max_ms,
            prob,
        }
    }

    #[test]
    fn rejects_negative_bounds() {
        assert!(DelayInjector::new(cfg(1, -1, 100, 1.0)).is_err());
        assert!(DelayInjector::new(cfg(1, 0, -5, 1.0)).is_err());
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(DelayInjector::new(cfg(1, 10, 5, 1.0)).is_err());
    }

    #[test]
    fn rejects_prob_outside_unit_interval() {
        assert!(DelayInjector::new(cfg(1, 0, 100, 1.5)).is_err());
        assert!(DelayInjector::new(cfg(1, 0, 100, -0.1)).is_err());
        assert!(DelayInjector::new(cfg(1, 0, 100, f64::NAN)).is_err());
    }

    #[test]
    fn replay_is_deterministic_for_fixed_seed() {
        let a = DelayInjector::new(cfg(42, 0, 1200, 0.7)).unwrap();
        let b = DelayInjector::new(cfg(42, 0, 1200, 0.7)).unwrap();
        let seq_a: Vec<u64> = (0..200).map(|_| a.pick_delay_ms()).collect();
        let seq_b: Vec<u64> = (0..200).map(|_| b.pick_delay_ms()).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn different_seeds_diverge() {
        let a = DelayInjector::new(cfg(1, 0, 1_000_000, 1.0)).unwrap();
        let b = DelayInjector::new(cfg(2, 0, 1_000_000, 1.0)).unwrap();
        let seq_a: Vec<u64> = (0..50).map(|_| a.pick_delay_ms()).collect();
        let seq_b: Vec<u64> = (0..50).map(|_| b.pick_delay_ms()).collect();
        assert_ne!(seq_a, seq_b);
    }

    #[test]
    fn prob_zero_never_fires() {
        let injector = DelayInjector::new(cfg(7, 100, 200, 0.0)).unwrap();
        assert!((0..500).all(|_| injector.pick_delay_ms() == 0));
    }

    #[test]
    fn prob_one_always_fires_within_bounds() {
        let injector = DelayInjector::new(cfg(7, 100, 200, 1.0)).unwrap();
        for _ in 0..500 {
            let d = injector.pick_delay_ms();
            assert!((100..=200).contains(&d), "delay {d} out of bounds");
        }
    }

    #[test]
    fn degenerate_range_pins_the_value() {
        let injector = DelayInjector::new(cfg(7, 250, 250, 1.0)).unwrap();
        assert!((0..100).all(|_| injector.pick_delay_ms() == 250));
    }

    #[test]
    fn gate_failure_skips_the_uniform_draw() {
        // With prob 0 only gate draws are consumed; a follow-up injector with
        // prob 1 from the same seed must then produce the same uniform values
        // as one that made the gate draws itself. Verified indirectly: two
        // injectors with identical configs stay in lockstep even when the
        // gate passes only sometimes.
        let a = DelayInjector::new(cfg(99, 1, 1_000_000, 0.5)).unwrap();
        let b = DelayInjector::new(cfg(99, 1, 1_000_000, 0.5)).unwrap();
        for _ in 0..300 {
            assert_eq!(a.pick_delay_ms(), b.pick_delay_ms());
        }
    }

    #[tokio::test]
    async fn inject_returns_picked_value() {
        let injector = DelayInjector::new(cfg(3, 1, 3, 1.0)).unwrap();
        let d = injector.inject().await;
        assert!((1..=3).contains(&d));
    }

    #[tokio::test]
    async fn inject_with_zero_prob_does_not_sleep() {
        let injector = DelayInjector::new(cfg(3, 5_000, 10_000, 0.0)).unwrap();
        let start = std::time::Instant::now();
        assert_eq!(injector.inject().await, 0);
        assert!(start.elapsed() < std::time::Duration::from_millis(500));
    }

    #[test]
    fn concurrent_draws_stay_gap_free() {
        // 4 threads x 100 draws must consume exactly the draws a sequential
        // replay would, just possibly in a different interleaving: the merged
        // multiset of nonzero values is order-dependent, but the total count
        // of calls observed by the RNG stream is fixed. We assert the cheap
        // invariant: all values stay within bounds and the injector survives
        // concurrent access.
        let injector = std::sync::Arc::new(DelayInjector::new(cfg(11, 10, 20, 1.0)).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let inj = injector.clone();
                std::thread::spawn(move || {
                    (0..100)
                        .map(|_| inj.pick_delay_ms())
                        .collect::<Vec<u64>>()
                })
            })
            .collect();
        for handle in handles {
            for d in handle.join().unwrap() {
                assert!((10..=20).contains(&d));
            }
        }
    }
}

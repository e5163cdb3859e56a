//! Reconnection backoff policy.
//!
//! Exponential growth with a hard cap, plus jitter on the actual sleep so
//! a fleet of clients does not reconnect in lockstep after a server
//! restart. The deterministic schedule and the jittered draw are separate
//! methods; tests assert over the former.

use crate::config::BackoffConfig;
use rand::Rng;
use std::time::Duration;

/// Computes retry delays from a consecutive-failure count.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    base: Duration,
    factor: f64,
    cap: Duration,
}

impl BackoffPolicy {
    pub fn new(config: &BackoffConfig) -> Self {
        Self {
            base: Duration::from_millis(config.base_ms),
            factor: config.factor,
            cap: Duration::from_millis(config.cap_ms),
        }
    }

    /// Deterministic delay for the given attempt (0-based): base * factor^n,
    /// saturating at the cap.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let cap_ms = self.cap.as_millis() as f64;
        let ms = self.base.as_millis() as f64 * self.factor.powi(attempt as i32);
        // powi overflows to inf for large attempts; min() handles it
        Duration::from_millis(ms.min(cap_ms) as u64)
    }

    /// Actual sleep for the given attempt: half the scheduled delay is
    /// kept, the other half is drawn uniformly, so the result lands in
    /// [base_delay / 2, base_delay].
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let ceiling = self.base_delay(attempt).as_millis() as u64;
        if ceiling == 0 {
            return Duration::ZERO;
        }
        let half = ceiling / 2;
        let ms = half + rand::thread_rng().gen_range(0..=ceiling - half);
        Duration::from_millis(ms)
    }
}

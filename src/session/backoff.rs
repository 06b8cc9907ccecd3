//! # Reconnect Backoff Policy
//!
//! Delay schedule for automatic reconnection:
//! `delay = min(base * 2^min(retries, cap_exponent) + jitter, max)`
//! with uniform random jitter so a fleet of dashboards does not hammer
//! the instrument in lockstep after an outage.

use std::time::Duration;

use rand::Rng;

/// Default base delay between reconnect attempts
pub const DEFAULT_BASE_MS: u64 = 3_000;

/// Default upper bound on the reconnect delay
pub const DEFAULT_MAX_MS: u64 = 30_000;

/// Default cap on the doubling exponent (2^4 = 16x base)
pub const DEFAULT_CAP_EXPONENT: u32 = 4;

/// Default jitter range added to each delay
pub const DEFAULT_JITTER_MS: u64 = 500;

/// Exponential backoff with jitter and a hard ceiling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
    max: Duration,
    cap_exponent: u32,
    jitter: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(DEFAULT_BASE_MS),
            max: Duration::from_millis(DEFAULT_MAX_MS),
            cap_exponent: DEFAULT_CAP_EXPONENT,
            jitter: Duration::from_millis(DEFAULT_JITTER_MS),
        }
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, max: Duration, cap_exponent: u32, jitter: Duration) -> Self {
        Self {
            base,
            max,
            cap_exponent,
            jitter,
        }
    }

    /// Delay before the next reconnect attempt, with random jitter
    pub fn delay(&self, retries: u32) -> Duration {
        let jitter_ms = if self.jitter.is_zero() {
            0
        } else {
            rand::thread_rng().gen_range(0..self.jitter.as_millis() as u64)
        };
        self.delay_with_jitter(retries, Duration::from_millis(jitter_ms))
    }

    /// Deterministic core of the schedule, separated for testing
    fn delay_with_jitter(&self, retries: u32, jitter: Duration) -> Duration {
        let exponent = retries.min(self.cap_exponent);
        let scaled = self
            .base
            .saturating_mul(2u32.saturating_pow(exponent))
            .saturating_add(jitter);
        scaled.min(self.max)
    }
}

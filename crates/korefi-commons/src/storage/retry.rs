//! Retry with exponential backoff for object store calls
//!
//! Wait before attempt `n + 1` is `multiplier * 2^(n - 1)` clamped to
//! `[min_wait, max_wait]`. With the defaults (3 attempts, 1s multiplier,
//! 4s..10s bounds) the waits are 4s then 4s.

use crate::config::{StorageConfig, MAX_WAIT_SECONDS_LIMIT};
use crate::error::StoreError;
use std::time::Duration;
use tracing::{debug, warn};

/// Lower bound of a single backoff sleep
pub const DEFAULT_MIN_WAIT: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub multiplier: Duration,
    pub min_wait: Duration,
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            multiplier: Duration::from_secs(1),
            min_wait: DEFAULT_MIN_WAIT,
            max_wait: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Policy from the storage config's tuning fields.
    ///
    /// `initial_wait_seconds` is the multiplier and `max_wait_seconds` the upper
    /// bound; the 4s floor never exceeds that bound. Out-of-range values are
    /// clamped to `[0, MAX_WAIT_SECONDS_LIMIT]`.
    pub fn from_config(config: &StorageConfig) -> Self {
        let max_wait = wait_seconds(config.max_wait_seconds);
        Self {
            max_attempts: config.max_retries.max(1),
            multiplier: wait_seconds(config.initial_wait_seconds),
            min_wait: DEFAULT_MIN_WAIT.min(max_wait),
            max_wait,
        }
    }

    /// Retry `max_attempts` times without sleeping
    pub fn no_wait(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            multiplier: Duration::ZERO,
            min_wait: Duration::ZERO,
            max_wait: Duration::ZERO,
        }
    }

    /// Sleep after the `failed_attempts`-th failure (1-based)
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(63) as i32;
        let secs = self.multiplier.as_secs_f64() * 2f64.powi(exponent);
        let clamped = secs
            .min(self.max_wait.as_secs_f64())
            .max(self.min_wait.as_secs_f64());
        Duration::try_from_secs_f64(clamped).unwrap_or(self.max_wait)
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or runs
    /// out of attempts. The last error is returned as-is.
    ///
    /// `op` receives the zero-based attempt index.
    pub fn run<T, F>(&self, operation: &str, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut(u32) -> Result<T, StoreError>,
    {
        let mut attempt = 0;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt + 1 < self.max_attempts => {
                    let wait = self.delay_for(attempt + 1);
                    debug!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "Transient object store error, retrying"
                    );
                    std::thread::sleep(wait);
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!(
                            operation,
                            attempts = attempt + 1,
                            error = %e,
                            "Giving up after retries"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}

// NaN falls through to zero
fn wait_seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.clamp(0.0, MAX_WAIT_SECONDS_LIMIT))
        .unwrap_or(Duration::ZERO)
}

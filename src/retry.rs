//! Exponential backoff with jitter for transient remote failures
//!
//! Used around platform API calls and code generation calls. Only errors that
//! classify as transient (rate limits, overload, 5xx, transport failures) are
//! retried; anything else is returned to the caller immediately.

use crate::error::ForgeResult;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Retry configuration with exponential backoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first one
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Delay before the first retry
    #[serde(default = "default_initial_delay", with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Upper bound for any single delay
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,

    /// Exponential growth factor
    #[serde(default = "default_base")]
    pub base: f64,

    /// Add jitter to delays
    #[serde(default = "default_jitter")]
    pub jitter: bool,

    /// Jitter factor (0.0 to 1.0)
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

fn default_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_base() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}

fn default_jitter_factor() -> f64 {
    0.5
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            base: default_base(),
            jitter: default_jitter(),
            jitter_factor: default_jitter_factor(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based), without jitter
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let multiplier = self.base.powi(exponent);
        let secs = self.initial_delay.as_secs_f64() * multiplier;
        if !secs.is_finite() || secs > self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }

    /// Apply jitter to delay
    pub fn apply_jitter(&self, delay: Duration) -> Duration {
        if !self.jitter || self.jitter_factor <= 0.0 {
            return delay;
        }

        let mut rng = rand::rng();
        let jitter_range = delay.as_secs_f64() * self.jitter_factor.min(1.0);
        let jitter = rng.random_range(-jitter_range / 2.0..=jitter_range / 2.0);
        Duration::from_secs_f64((delay.as_secs_f64() + jitter).max(0.0))
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out
    pub async fn execute<F, Fut, T>(&self, description: &str, mut operation: F) -> ForgeResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ForgeResult<T>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < attempts => {
                    let delay = self.apply_jitter(self.calculate_delay(attempt));
                    info!(
                        "Retrying {} (attempt {}/{}) after {:?}: {}",
                        description, attempt, attempts, delay, err
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    if err.is_transient() {
                        warn!("Giving up on {} after {} attempts", description, attempt);
                    }
                    return Err(err);
                }
            }
        }
    }
}

/// Check if an error message indicates a transient failure
///
/// Used for collaborators that only report free text (for example the
/// stderr of the code generation CLI).
pub fn is_transient_message(message: &str) -> bool {
    const TRANSIENT_PATTERNS: &[&str] = &[
        "rate limit",
        "overloaded",
        "timeout",
        "timed out",
        "connection refused",
        "connection reset",
        "temporary failure",
        "503",
        "529",
        "429",
        "too many requests",
        "service unavailable",
    ];

    let lower = message.to_lowercase();
    TRANSIENT_PATTERNS.iter().any(|pattern| lower.contains(pattern))
}

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Retry logic with exponential backoff.
//!
//! The attempt loop is bounded (a run never blocks forever on one item)
//! and sleeps through an injected [`Sleeper`], so backoff timing is
//! testable without real delays. Retries hold no engine lock while
//! backing off.
//!
//! # Example
//!
//! ```
//! use reconciler::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new(3, Duration::from_millis(500));
//! assert_eq!(policy.max_attempts, 3);
//! // Delays double per attempt: 500ms, 1s, ...
//! assert_eq!(policy.factor, 2.0);
//! ```

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

/// Bounded retry behavior for one external operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: usize,
    pub initial_delay: Duration,
    /// Delay multiplier per attempt.
    pub factor: f64,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Doubling backoff capped at one minute.
    #[must_use]
    pub fn new(max_attempts: usize, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            factor: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }

    /// Minimal delays for tests.
    #[cfg(test)]
    pub fn test() -> Self {
        Self::new(3, Duration::from_millis(1))
    }
}

/// Clock abstraction so tests can observe backoff without waiting it out.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by `tokio::time`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// All attempts failed. Carries the last error and how many attempts ran.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub error: E,
    pub attempts: usize,
}

/// Run `operation` under `policy`.
///
/// On success returns the value plus the number of attempts used; on
/// exhaustion returns the last error. Each failure doubles the delay
/// (capped at `max_delay`) before the next attempt.
pub async fn retry<F, Fut, T, E>(
    operation_name: &str,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut operation: F,
) -> Result<(T, usize), Exhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = policy.initial_delay.min(policy.max_delay);
    let mut attempts = 0;

    loop {
        match operation().await {
            Ok(val) => {
                attempts += 1;
                if attempts > 1 {
                    info!(
                        operation = operation_name,
                        attempts, "Operation succeeded after retries"
                    );
                }
                return Ok((val, attempts));
            }
            Err(err) => {
                attempts += 1;
                if attempts >= policy.max_attempts {
                    warn!(
                        operation = operation_name,
                        attempts,
                        error = %err,
                        "Operation exhausted retries"
                    );
                    return Err(Exhausted {
                        error: err,
                        attempts,
                    });
                }

                warn!(
                    operation = operation_name,
                    attempt = attempts,
                    max = policy.max_attempts,
                    error = %err,
                    next_delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying"
                );
                sleeper.sleep(delay).await;
                // Saturating scale: `Duration::mul_f64` panics on overflow,
                // so clamp to `max_delay` before it can get that far.
                let scaled = delay.as_secs_f64() * policy.factor;
                delay = if scaled.is_finite() && scaled < policy.max_delay.as_secs_f64() {
                    Duration::from_secs_f64(scaled.max(0.0))
                } else {
                    policy.max_delay
                };
            }
        }
    }
}

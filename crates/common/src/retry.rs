//! Exponential-backoff retries for store operations that fail transiently.
//!
//! Writers retry command-store appends and the projector retries query-store
//! upserts with [`retry`]. Only errors whose [`Transient::is_transient`]
//! returns true are retried; anything else is handed back immediately.

use std::future::Future;
use std::time::Duration;

/// Classifies errors that are expected to clear up on retry.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// A policy that retries without waiting, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            max_attempts,
        }
    }

    /// Calculate the next backoff delay from the current delay.
    ///
    /// The result is clamped to [`RetryPolicy::max_delay`].
    pub fn next_delay(&self, current: Duration) -> Duration {
        let next_ms = (current.as_millis() as f64 * self.multiplier) as u64;
        Duration::from_millis(next_ms).min(self.max_delay)
    }
}

/// Why a retried operation finally failed.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The error was not transient; it was returned on the attempt it occurred.
    Permanent(E),
    /// Every attempt failed transiently.
    Exhausted { attempts: u32, last: E },
}

/// Runs `op` until it succeeds, fails permanently, or the policy runs out of attempts.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(RetryError::Permanent(e)),
            Err(e) if attempt >= max_attempts => {
                tracing::error!(operation, attempt, error = %e, "giving up after transient failures");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: e,
                });
            }
            Err(e) => {
                tracing::warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient failure, retrying",
                );
            }
        }

        tokio::time::sleep(delay).await;
        delay = policy.next_delay(delay);
    }
}

//! Retrying async operations with a bounded total duration.

use std::{fmt::Display, future::Future, time::Duration};
use tokio::time::{sleep, Instant};
use tracing::debug;

/// How long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Always wait the same amount.
    Constant(Duration),
    /// Wait `base`, `base`, `2 * base`, `3 * base`, `5 * base`, ... capped at `max`.
    Fibonacci {
        /// First delay.
        base: Duration,
        /// Upper bound for a single delay.
        max: Duration,
    },
}

impl Backoff {
    /// Delay before attempt `attempt + 1`, `attempt` counting from 1.
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Constant(delay) => delay,
            Self::Fibonacci { base, max } => {
                let (mut prev, mut curr) = (0u32, 1u32);
                for _ in 1..attempt {
                    let next = prev.saturating_add(curr);
                    prev = curr;
                    curr = next;
                }
                base.saturating_mul(curr).min(max)
            }
        }
    }
}

/// Backoff plus the overall time budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Delay strategy.
    pub backoff: Backoff,
    /// Give up once this much time has passed since the first attempt.
    pub max_duration: Duration,
}

impl RetryConfig {
    /// Constant backoff.
    pub const fn constant(delay: Duration, max_duration: Duration) -> Self {
        Self { backoff: Backoff::Constant(delay), max_duration }
    }

    /// Fibonacci backoff starting at `base`, each delay capped at `max_duration`.
    pub const fn fibonacci(base: Duration, max_duration: Duration) -> Self {
        Self { backoff: Backoff::Fibonacci { base, max: max_duration }, max_duration }
    }
}

/// Failure of a single attempt.
#[derive(Debug)]
pub enum Attempt<E> {
    /// Try again after the backoff.
    Retryable(E),
    /// Stop immediately.
    Permanent(E),
}

/// Errors from [`retry`].
#[derive(thiserror::Error, Debug)]
pub enum Error<E: Display> {
    /// ran out of time
    #[error("gave up after {attempts} attempts in {elapsed:?}: {last}")]
    GaveUp {
        /// attempts made
        attempts: u32,
        /// time spent
        elapsed: Duration,
        /// error of the last attempt
        last: E,
    },
    /// operation reported a permanent failure
    #[error("permanent failure: {0}")]
    Permanent(E),
}

/// Run `op` until it succeeds, fails permanently or `config.max_duration` is exhausted.
///
/// The operation is always attempted at least once. No sleep is started that would end past the
/// deadline; in that case the error of the last attempt is returned right away.
pub async fn retry<T, E, F, Fut>(config: RetryConfig, mut op: F) -> Result<T, Error<E>>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Attempt<E>>>,
{
    let start = Instant::now();
    let deadline = start + config.max_duration;
    let mut attempts = 0;

    loop {
        attempts += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(Attempt::Permanent(e)) => return Err(Error::Permanent(e)),
            Err(Attempt::Retryable(e)) => {
                let delay = config.backoff.delay(attempts);
                if Instant::now() + delay > deadline {
                    return Err(Error::GaveUp { attempts, elapsed: start.elapsed(), last: e });
                }

                debug!(attempts, ?delay, error = %e, "retrying");
                sleep(delay).await;
            }
        }
    }
}

//! Bounded retry and convergence polling.
//!
//! Every cluster-mutating or state-observing operation in the engine runs
//! through one of the two primitives in this module. No other component
//! implements its own retry loop; tolerating a slow, eventually-consistent
//! backend is concentrated here.
//!
//! [`retry`] handles transient failures of a single operation with a bounded
//! attempt count and randomized backoff. [`poll_until`] waits for the backend
//! to converge on an expected post-condition, treating predicate failures as
//! "not yet satisfied" rather than errors.

use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::ops::Range;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Retry budget and backoff range for [`retry`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of invocations, including the first.
    pub max_attempts: usize,
    /// Backoff slept between attempts, drawn uniformly from this range.
    pub backoff: Range<Duration>,
}

impl RetryPolicy {
    /// Create a policy with the given attempt budget and backoff range.
    #[must_use]
    pub fn new(max_attempts: usize, backoff: Range<Duration>) -> Self {
        Self { max_attempts, backoff }
    }

    fn sample_backoff(&self) -> Duration {
        if self.backoff.end <= self.backoff.start {
            return self.backoff.start;
        }
        rand::thread_rng().gen_range(self.backoff.clone())
    }
}

impl Default for RetryPolicy {
    /// The bulk-update policy: up to 100 attempts, 0-5s randomized backoff.
    fn default() -> Self {
        Self::new(100, Duration::ZERO..Duration::from_millis(5000))
    }
}

/// Failure signaled by [`retry`] once its attempt budget is spent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryError<E> {
    /// All attempts failed; carries the last observed failure.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted {
        /// Number of attempts made.
        attempts: usize,
        /// The failure from the final attempt.
        last: E,
    },
}

/// Failure signaled by [`poll_until`] when the deadline elapses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    /// The predicate never became true within the timeout.
    #[error("condition not reached within {waited:?}")]
    Timeout {
        /// Total time waited.
        waited: Duration,
    },
}

/// Invoke `op`, retrying on failure up to the policy's attempt budget.
///
/// A uniformly random backoff from the policy's range is slept between
/// attempts. Returns the operation's value on the first success, or
/// [`RetryError::Exhausted`] carrying the last failure.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    debug_assert!(policy.max_attempts > 0, "retry policy must allow at least one attempt");
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= policy.max_attempts => {
                warn!(attempt, error = %err, "final attempt failed, giving up");
                return Err(RetryError::Exhausted { attempts: attempt, last: err });
            }
            Err(err) => {
                let backoff = policy.sample_backoff();
                debug!(attempt, error = %err, ?backoff, "attempt failed, backing off");
                sleep(backoff).await;
            }
        }
    }
}

/// Evaluate `predicate` every `interval` until it reports true.
///
/// Predicate errors are logged and treated as "not yet satisfied" — an
/// eventually-consistent backend is allowed to be briefly unreadable while it
/// converges. Signals [`PollError::Timeout`] once `timeout` has elapsed; the
/// timeout is checked after each evaluation, so the error surfaces no earlier
/// than `timeout` and no later than `timeout + interval`.
pub async fn poll_until<F, Fut, E>(
    interval: Duration,
    timeout: Duration,
    mut predicate: F,
) -> Result<(), PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: Display,
{
    let started = Instant::now();
    loop {
        match predicate().await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(err) => {
                debug!(error = %err, "poll predicate failed, treating as not yet satisfied");
            }
        }
        if started.elapsed() >= timeout {
            return Err(PollError::Timeout { waited: started.elapsed() });
        }
        sleep(interval).await;
    }
}

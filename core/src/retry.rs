// rackflow/src/retry.rs

//! Bounded retry with exponential backoff.
//!
//! Retries are meant for operations that are safe to repeat: read-only checks
//! against the store and idempotent compensations. A write that claims a
//! resource must never be wrapped in a retry loop.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Retry policy for exponential backoff.
///
/// `max_retries` counts retries after the first attempt, so an operation is
/// attempted at most `max_retries + 1` times.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
  pub max_retries: usize,
  pub initial_delay: Duration,
  pub max_delay: Duration,
  pub multiplier: f64,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_retries: 2,
      initial_delay: Duration::from_millis(25),
      max_delay: Duration::from_millis(500),
      multiplier: 2.0,
    }
  }
}

impl RetryPolicy {
  /// A policy that never retries.
  pub fn none() -> Self {
    Self {
      max_retries: 0,
      ..Self::default()
    }
  }

  /// Retries until the operation succeeds. Backoff still caps at `max_delay`.
  pub fn until_success() -> Self {
    Self {
      max_retries: usize::MAX,
      ..Self::default()
    }
  }

  pub fn is_unbounded(&self) -> bool {
    self.max_retries == usize::MAX
  }

  pub fn with_max_retries(mut self, max_retries: usize) -> Self {
    self.max_retries = max_retries;
    self
  }

  pub fn with_initial_delay(mut self, delay: Duration) -> Self {
    self.initial_delay = delay;
    self
  }

  pub fn with_max_delay(mut self, delay: Duration) -> Self {
    self.max_delay = delay;
    self
  }

  /// Delay before retry number `attempt` (0-based), capped at `max_delay`.
  pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
    let factor = self.multiplier.powi(i32::try_from(attempt).unwrap_or(i32::MAX));
    let delay_ms = self.initial_delay.as_millis() as f64 * factor;
    if !delay_ms.is_finite() || delay_ms >= self.max_delay.as_millis() as f64 {
      return self.max_delay;
    }
    Duration::from_millis(delay_ms as u64)
  }
}

/// Runs `operation` until it succeeds, the error is not retryable, or the
/// policy's retry budget is spent. Returns the last error in the latter cases.
pub async fn retry_with_predicate<F, Fut, T, E, P>(policy: &RetryPolicy, mut operation: F, is_retryable: P) -> Result<T, E>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, E>>,
  E: std::fmt::Display,
  P: Fn(&E) -> bool,
{
  let mut attempt = 0;
  loop {
    match operation().await {
      Ok(value) => {
        if attempt > 0 {
          info!(attempt, "Operation succeeded after retry.");
        }
        return Ok(value);
      }
      Err(err) if attempt < policy.max_retries && is_retryable(&err) => {
        let delay = policy.delay_for_attempt(attempt);
        warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "Operation failed, retrying.");
        sleep(delay).await;
        attempt = attempt.saturating_add(1);
      }
      Err(err) => return Err(err),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[test]
  fn delay_grows_and_caps() {
    let policy = RetryPolicy {
      max_retries: 5,
      initial_delay: Duration::from_millis(10),
      max_delay: Duration::from_millis(50),
      multiplier: 2.0,
    };
    assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(10));
    assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(20));
    assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(40));
    assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(50));
    assert_eq!(policy.delay_for_attempt(60), Duration::from_millis(50));
  }

  #[tokio::test]
  async fn stops_on_non_retryable_error() {
    let calls = AtomicUsize::new(0);
    let policy = RetryPolicy::default().with_initial_delay(Duration::from_millis(1));
    let result: Result<(), String> = retry_with_predicate(
      &policy,
      || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err("permanent".to_string()) }
      },
      |e: &String| e.contains("transient"),
    )
    .await;
    assert_eq!(result, Err("permanent".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn unbounded_policy_outlasts_a_long_outage() {
    let calls = AtomicUsize::new(0);
    let policy = RetryPolicy::until_success()
      .with_initial_delay(Duration::from_millis(1))
      .with_max_delay(Duration::from_millis(2));
    assert!(policy.is_unbounded());
    let result: Result<usize, String> = retry_with_predicate(
      &policy,
      || {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        async move {
          if n < 40 {
            Err("store down".to_string())
          } else {
            Ok(n)
          }
        }
      },
      |_| true,
    )
    .await;
    assert_eq!(result, Ok(40));
    assert_eq!(calls.load(Ordering::SeqCst), 41);
  }

  #[tokio::test]
  async fn gives_up_after_budget() {
    let calls = AtomicUsize::new(0);
    let policy = RetryPolicy::default()
      .with_max_retries(3)
      .with_initial_delay(Duration::from_millis(1));
    let result: Result<(), String> = retry_with_predicate(
      &policy,
      || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err("transient".to_string()) }
      },
      |_| true,
    )
    .await;
    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 4);
  }
}

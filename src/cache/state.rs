//! Query result states and the read retry policy.

use color_eyre::eyre::eyre;
use std::time::Duration;

/// The state of a cached query as seen by a caller.
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// The read was never issued (remote client not ready, nothing cached)
  Idle,
  /// Query completed, possibly served from cache
  Success(T),
  /// Query failed with an error
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn into_data(self) -> Option<T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }

  /// Unwrap into a Result, reporting a disabled read as an error.
  pub fn require(self, what: &str) -> color_eyre::Result<T> {
    match self {
      QueryState::Success(data) => Ok(data),
      QueryState::Error(e) => Err(eyre!("Failed to load {what}: {e}")),
      QueryState::Idle => Err(eyre!("Failed to load {what}: service connection is not ready")),
    }
  }
}

/// Bounded exponential backoff schedule for read fetches.
///
/// A fetch is attempted at most `max_attempts` times; the delay doubles after
/// each failure, starting at `base_delay` and capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  pub base_delay: Duration,
  pub max_delay: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      base_delay: Duration::from_millis(500),
      max_delay: Duration::from_secs(5),
    }
  }
}

impl RetryPolicy {
  /// Delay to sleep after the given failed attempt (1-based).
  pub fn delay_after(&self, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    self
      .base_delay
      .saturating_mul(2u32.saturating_pow(exp))
      .min(self.max_delay)
  }
}

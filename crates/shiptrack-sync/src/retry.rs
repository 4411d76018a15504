//! Exponential-backoff retry for adapter calls.

use std::{future::Future, time::Duration};

use thiserror::Error;

/// All attempts failed; carries the attempt count (initial call included)
/// and the last error observed.
#[derive(Debug, Error)]
#[error("exhausted after {attempts} attempts: {last}")]
pub struct RetryExhausted<E: std::error::Error> {
  pub attempts: u32,
  #[source]
  pub last:     E,
}

/// Delay between attempt `n` and `n + 1` is `base_delay * 2^n`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
  pub max_retries: u32,
  pub base_delay:  Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self { max_retries: 3, base_delay: Duration::from_secs(1) }
  }
}

impl RetryPolicy {
  /// Backoff before retry number `attempt + 1` (zero-based).
  pub fn delay_for(&self, attempt: u32) -> Duration {
    self.base_delay * 2u32.saturating_pow(attempt)
  }

  /// Run `op` until it succeeds or the retry budget is spent. A policy with
  /// `max_retries = 3` makes at most 4 calls.
  pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, RetryExhausted<E>>
  where
    E: std::error::Error,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
  {
    let mut attempt = 0u32;
    loop {
      match op().await {
        Ok(value) => return Ok(value),
        Err(e) if attempt >= self.max_retries => {
          return Err(RetryExhausted { attempts: attempt + 1, last: e });
        }
        Err(e) => {
          let delay = self.delay_for(attempt);
          tracing::debug!(
            attempt,
            ?delay,
            error = %e,
            "adapter call failed, backing off"
          );
          tokio::time::sleep(delay).await;
          attempt += 1;
        }
      }
    }
  }
}
